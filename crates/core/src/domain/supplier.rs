use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::collective::CollectiveId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SupplierId(pub i64);

impl fmt::Display for SupplierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BidId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierType {
    Insurer,
    Pharmacy,
    PharmaManufacturer,
}

impl SupplierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insurer => "insurer",
            Self::Pharmacy => "pharmacy",
            Self::PharmaManufacturer => "pharma_manufacturer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "insurer" => Some(Self::Insurer),
            "pharmacy" => Some(Self::Pharmacy),
            "pharma_manufacturer" => Some(Self::PharmaManufacturer),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidKind {
    InsurancePremium,
    RxDiscount,
    TelehealthBundle,
}

impl BidKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsurancePremium => "insurance_premium",
            Self::RxDiscount => "rx_discount",
            Self::TelehealthBundle => "telehealth_bundle",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "insurance_premium" => Some(Self::InsurancePremium),
            "rx_discount" => Some(Self::RxDiscount),
            "telehealth_bundle" => Some(Self::TelehealthBundle),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub supplier_type: SupplierType,
}

/// Bid row written for analytics when quotes are simulated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSupplierBid {
    pub supplier_id: SupplierId,
    pub collective_id: CollectiveId,
    pub bid_type: BidKind,
    pub monthly_premium: Decimal,
    pub discount_percent: Decimal,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierBid {
    pub id: BidId,
    pub supplier_id: SupplierId,
    pub collective_id: CollectiveId,
    pub bid_type: BidKind,
    pub monthly_premium: Decimal,
    pub discount_percent: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SupplierBid {
    pub fn from_new(id: BidId, bid: NewSupplierBid, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            supplier_id: bid.supplier_id,
            collective_id: bid.collective_id,
            bid_type: bid.bid_type,
            monthly_premium: bid.monthly_premium,
            discount_percent: bid.discount_percent,
            notes: bid.notes,
            created_at,
        }
    }
}
