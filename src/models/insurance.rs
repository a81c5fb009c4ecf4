use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Cover period offered at quote time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InsurancePeriod {
    OneMonth,
    ThreeMonths,
    SixMonths,
    TwelveMonths,
}

impl InsurancePeriod {
    pub fn months(self) -> u32 {
        match self {
            Self::OneMonth => 1,
            Self::ThreeMonths => 3,
            Self::SixMonths => 6,
            Self::TwelveMonths => 12,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OneMonth => "1 month",
            Self::ThreeMonths => "3 months",
            Self::SixMonths => "6 months",
            Self::TwelveMonths => "12 months",
        }
    }

    /// Last covered day: start + months - 1 day.
    pub fn end_date(self, start: NaiveDate) -> Option<NaiveDate> {
        start
            .checked_add_months(Months::new(self.months()))
            .and_then(|d| d.pred_opt())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Addon {
    /// COMESA yellow card for regional travel
    Comesa,
    /// Personal accident cover for occupants
    #[strum(serialize = "personal_accident", serialize = "pa")]
    PersonalAccident,
}

impl Addon {
    pub fn label(self) -> &'static str {
        match self {
            Self::Comesa => "COMESA yellow card",
            Self::PersonalAccident => "Personal accident",
        }
    }
}

/// Personal accident cover level. Higher categories carry higher benefits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaCategory {
    Cat1,
    Cat2,
    Cat3,
    Cat4,
    Cat5,
}

impl PaCategory {
    /// Flat premium for the whole cover period, in RWF.
    pub fn premium(self) -> u64 {
        match self {
            Self::Cat1 => 5_000,
            Self::Cat2 => 10_000,
            Self::Cat3 => 15_000,
            Self::Cat4 => 20_000,
            Self::Cat5 => 25_000,
        }
    }

    /// Death / disability benefit, in RWF.
    pub fn benefit(self) -> u64 {
        match self {
            Self::Cat1 => 1_000_000,
            Self::Cat2 => 2_000_000,
            Self::Cat3 => 3_000_000,
            Self::Cat4 => 4_000_000,
            Self::Cat5 => 5_000_000,
        }
    }

    pub fn label(self) -> String {
        let n = match self {
            Self::Cat1 => 1,
            Self::Cat2 => 2,
            Self::Cat3 => 3,
            Self::Cat4 => 4,
            Self::Cat5 => 5,
        };
        format!("Category {n}")
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentPlan {
    Full,
    TwoInstallments,
    FourInstallments,
}

impl PaymentPlan {
    pub fn installments(self) -> u64 {
        match self {
            Self::Full => 1,
            Self::TwoInstallments => 2,
            Self::FourInstallments => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Full => "Pay in full",
            Self::TwoInstallments => "2 installments",
            Self::FourInstallments => "4 installments",
        }
    }

    /// Splits `total` evenly; the remainder goes on the first installment.
    pub fn schedule(self, total: u64) -> Vec<u64> {
        let n = self.installments();
        let share = total / n;
        let mut amounts = vec![share; n as usize];
        amounts[0] += total - share * n;
        amounts
    }
}

/// Tariff inputs for quoting, taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct InsuranceRates {
    pub base_monthly_premium: u64,
    pub comesa_monthly_surcharge: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumBreakdown {
    pub base: u64,
    pub comesa: u64,
    pub personal_accident: u64,
    pub total: u64,
}

/// Computes the premium for a cover window.
///
/// Any started calendar month is billed in full, so an edited end date is
/// priced by what it actually covers.
pub fn quote_premium(
    rates: InsuranceRates,
    start: NaiveDate,
    end: NaiveDate,
    addons: &[Addon],
    pa_category: Option<PaCategory>,
) -> PremiumBreakdown {
    let months = covered_months(start, end);

    let base = rates.base_monthly_premium * months;
    let comesa = if addons.contains(&Addon::Comesa) {
        rates.comesa_monthly_surcharge * months
    } else {
        0
    };
    let personal_accident = if addons.contains(&Addon::PersonalAccident) {
        pa_category.map(PaCategory::premium).unwrap_or(0)
    } else {
        0
    };

    PremiumBreakdown {
        base,
        comesa,
        personal_accident,
        total: base + comesa + personal_accident,
    }
}

/// Number of calendar months needed to reach `end`, at least one.
pub fn covered_months(start: NaiveDate, end: NaiveDate) -> u64 {
    let mut months = 1u32;
    while let Some(last_day) = start
        .checked_add_months(Months::new(months))
        .and_then(|d| d.pred_opt())
    {
        if last_day >= end {
            break;
        }
        months += 1;
    }
    u64::from(months)
}

/// A motor insurance quote produced at the end of the insurance flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceQuote {
    pub id: Uuid,
    pub owner: String,
    pub vehicle_plate: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub addons: Vec<Addon>,
    pub pa_category: Option<PaCategory>,
    pub payment_plan: PaymentPlan,
    pub premium: PremiumBreakdown,
    pub created_at: DateTime<Utc>,
}
