pub mod cardgate;
pub mod coinpay;
pub mod linkpay;
pub mod swiftpay;
pub mod walletgo;

pub use cardgate::CardGateProvider;
pub use coinpay::CoinPayProvider;
pub use linkpay::LinkPayProvider;
pub use swiftpay::SwiftPayProvider;
pub use walletgo::WalletGoProvider;
