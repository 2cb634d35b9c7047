//! Normalization of provider-native status vocabularies into the canonical
//! payment state machine.
//!
//! Pure lookup tables, one per gateway. Anything a table does not recognize
//! maps to `error` so an unexpected vocabulary change surfaces in the audit
//! trail instead of being silently dropped.

use crate::payments::types::{LinkStatus, PaymentState, ProviderName};

/// Map a provider-native payment status onto the canonical state machine.
pub fn normalize(provider: ProviderName, raw: &str) -> PaymentState {
    let raw = raw.trim();
    match provider {
        ProviderName::LinkPay => match raw {
            "Created" => PaymentState::Created,
            "Activated" => PaymentState::Pending,
            "Completed" => PaymentState::Completed,
            "Expired" => PaymentState::Expired,
            "Cancelled" => PaymentState::Cancelled,
            "Error" => PaymentState::Error,
            _ => PaymentState::Error,
        },
        ProviderName::SwiftPay => match raw {
            "CREATED" => PaymentState::Created,
            "INITIATED" | "AUTHORIZED" => PaymentState::Pending,
            "CAPTURED" => PaymentState::Completed,
            "EXPIRED" => PaymentState::Expired,
            "CANCELLED" | "TERMINATED" => PaymentState::Cancelled,
            "FAILED" => PaymentState::Error,
            _ => PaymentState::Error,
        },
        ProviderName::CardGate => match raw {
            "open" => PaymentState::Pending,
            "paid" => PaymentState::Completed,
            "expired" => PaymentState::Expired,
            "canceled" => PaymentState::Cancelled,
            "failed" => PaymentState::Error,
            _ => PaymentState::Error,
        },
        ProviderName::WalletGo => match raw {
            "pending" => PaymentState::Pending,
            "confirmed" => PaymentState::Completed,
            "declined" => PaymentState::Cancelled,
            "timeout" => PaymentState::Expired,
            _ => PaymentState::Error,
        },
        ProviderName::CoinPay => match raw {
            "New" => PaymentState::Created,
            "Processing" => PaymentState::Pending,
            "Settled" => PaymentState::Completed,
            "Expired" => PaymentState::Expired,
            "Invalid" => PaymentState::Error,
            _ => PaymentState::Error,
        },
    }
}

/// Map a dual-status provider's session/link state onto the link dimension.
///
/// Only gateways that report the link separately from the money movement
/// feed this table; single-status providers never touch the link dimension
/// after creation.
pub fn normalize_link(provider: ProviderName, raw: &str) -> Option<LinkStatus> {
    let raw = raw.trim();
    match provider {
        ProviderName::SwiftPay => match raw {
            "SessionCreated" | "PaymentInitiated" => Some(LinkStatus::Success),
            "SessionExpired" => Some(LinkStatus::Expired),
            "SessionTerminated" => Some(LinkStatus::Failed),
            _ => None,
        },
        _ => None,
    }
}
