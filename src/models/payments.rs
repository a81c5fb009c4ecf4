use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// What the payment QR code points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QrType {
    /// Mobile money phone number
    Phone,
    /// Merchant MoMo pay code
    MomoCode,
}

impl QrType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Phone => "Phone number",
            Self::MomoCode => "MoMo pay code",
        }
    }
}

/// The user's choice of an open or fixed-amount code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AmountMode {
    NoAmount,
    WithAmount,
}

/// Amount embedded in the code. `Open` lets the payer type the amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum QrAmount {
    Open,
    Fixed(u64),
}

/// Builds the MoMo USSD dial string encoded in the QR code.
///
/// Phone numbers use `*182*1*1*<phone>[*<amount>]#`, pay codes use
/// `*182*8*1*<code>[*<amount>]#`.
pub fn ussd_string(qr_type: QrType, identifier: &str, amount: QrAmount) -> String {
    let prefix = match qr_type {
        QrType::Phone => "*182*1*1*",
        QrType::MomoCode => "*182*8*1*",
    };
    match amount {
        QrAmount::Open => format!("{prefix}{identifier}#"),
        QrAmount::Fixed(value) => format!("{prefix}{identifier}*{value}#"),
    }
}

/// A generated payment QR code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrCodeRecord {
    pub id: Uuid,
    pub owner: String,
    pub qr_type: QrType,
    pub identifier: String,
    pub amount: QrAmount,
    pub ussd: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ussd_for_phone() {
        assert_eq!(
            ussd_string(QrType::Phone, "0788123456", QrAmount::Open),
            "*182*1*1*0788123456#"
        );
        assert_eq!(
            ussd_string(QrType::Phone, "0788123456", QrAmount::Fixed(5000)),
            "*182*1*1*0788123456*5000#"
        );
    }

    #[test]
    fn test_ussd_for_momo_code() {
        assert_eq!(
            ussd_string(QrType::MomoCode, "123456", QrAmount::Fixed(1500)),
            "*182*8*1*123456*1500#"
        );
    }

    #[test]
    fn test_qr_amount_serialization() {
        assert_eq!(
            serde_json::to_value(QrAmount::Fixed(10)).unwrap(),
            serde_json::json!({"kind": "fixed", "value": 10})
        );
        assert_eq!(
            serde_json::to_value(QrAmount::Open).unwrap(),
            serde_json::json!({"kind": "open"})
        );
    }
}
