mod common;

use chatflows::models::insurance::{Addon, InsurancePeriod, PaCategory, PaymentPlan};
use chatflows::providers::RecordStore;
use chatflows::services::conversation::DispatchOutcome;
use chatflows::services::conversation::state_machine::State;
use chrono::{Days, NaiveDate, Utc};
use common::Harness;

const USER: &str = "250788000777";

fn start_date() -> NaiveDate {
    Utc::now().date_naive() + Days::new(10)
}

fn ddmmyyyy(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

async fn at_period_step(h: &Harness) {
    h.list(USER, "insurance").await;
    h.button(USER, "start_quote").await;
    h.text(USER, "rab 123 c").await;
    let report = h.text(USER, &ddmmyyyy(start_date())).await;
    assert_eq!(report.state, Some(State::InsurancePeriod));
}

#[tokio::test]
async fn test_full_quote_with_comesa() {
    let h = Harness::new();
    at_period_step(&h).await;

    let report = h.list(USER, "three_months").await;
    assert_eq!(report.state, Some(State::InsuranceConfirmDates));
    let end = InsurancePeriod::ThreeMonths.end_date(start_date()).unwrap();
    assert!(h.sender.last_for(USER).await.unwrap().body().contains(&ddmmyyyy(end)));

    let report = h.button(USER, "confirm_dates").await;
    assert_eq!(report.state, Some(State::InsuranceAddons));

    let report = h.list(USER, "comesa").await;
    assert_eq!(
        report.outcome,
        DispatchOutcome::Transitioned {
            from: State::InsuranceAddons,
            to: State::InsuranceSummary
        }
    );
    let summary = h.sender.last_for(USER).await.unwrap();
    assert!(summary.body().contains("Plate: RAB123C"));
    assert!(summary.body().contains("Third-party liability: 36000 RWF"));
    assert!(summary.body().contains("COMESA yellow card: 12000 RWF"));
    assert!(summary.body().contains("Total: 48000 RWF"));
    assert_eq!(summary.option_ids(), vec!["accept", "change_addons"]);

    h.button(USER, "accept").await;
    let report = h.button(USER, "two_installments").await;
    assert_eq!(report.state, Some(State::InsuranceQuoteReady));
    assert!(
        h.sender
            .last_for(USER)
            .await
            .unwrap()
            .body()
            .contains("24000 RWF + 24000 RWF")
    );

    let saved = h.session(USER).await.unwrap();
    let quote = h
        .records
        .get_quote(saved.context.insurance.quote_id.unwrap())
        .await
        .unwrap()
        .expect("quote stored");
    assert_eq!(quote.vehicle_plate, "RAB123C");
    assert_eq!(quote.start_date, start_date());
    assert_eq!(quote.end_date, end);
    assert_eq!(quote.addons, vec![Addon::Comesa]);
    assert_eq!(quote.pa_category, None);
    assert_eq!(quote.payment_plan, PaymentPlan::TwoInstallments);
    assert_eq!(quote.premium.total, 48_000);
}

#[tokio::test]
async fn test_personal_accident_asks_for_category() {
    let h = Harness::new();
    at_period_step(&h).await;
    h.list(USER, "one_month").await;
    h.button(USER, "confirm_dates").await;

    let report = h.text(USER, "pa").await;
    assert_eq!(report.state, Some(State::InsurancePaCategory));
    assert_eq!(
        h.sender.last_for(USER).await.unwrap().option_ids(),
        vec!["cat1", "cat2", "cat3", "cat4", "cat5"]
    );

    let report = h.list(USER, "cat2").await;
    assert_eq!(report.state, Some(State::InsuranceSummary));
    let summary = h.sender.last_for(USER).await.unwrap();
    assert!(summary.body().contains("Personal accident (Category 2): 10000 RWF"));
    assert!(summary.body().contains("Total: 22000 RWF"));

    let saved = h.session(USER).await.unwrap();
    assert_eq!(saved.context.insurance.pa_category, Some(PaCategory::Cat2));
    assert_eq!(saved.context.insurance.addons, Some(vec![Addon::PersonalAccident]));
}

#[tokio::test]
async fn test_edited_end_date_is_bounded() {
    let h = Harness::new();
    at_period_step(&h).await;
    h.list(USER, "one_month").await;

    let report = h.button(USER, "edit_end_date").await;
    assert_eq!(report.state, Some(State::InsuranceEditEndDate));

    let too_late = start_date() + Days::new(400);
    let report = h.text(USER, &ddmmyyyy(too_late)).await;
    assert_eq!(report.outcome, DispatchOutcome::Unchanged);
    assert!(h.sender.last_for(USER).await.unwrap().body().contains("12 months"));

    let report = h.text(USER, &ddmmyyyy(start_date())).await;
    assert_eq!(report.outcome, DispatchOutcome::Unchanged);

    let end = start_date() + Days::new(45);
    let report = h.text(USER, &ddmmyyyy(end)).await;
    assert_eq!(
        report.outcome,
        DispatchOutcome::Transitioned {
            from: State::InsuranceEditEndDate,
            to: State::InsuranceConfirmDates
        }
    );
    assert_eq!(h.session(USER).await.unwrap().context.insurance.end_date, Some(end));

    h.button(USER, "confirm_dates").await;
    h.list(USER, "none").await;
    let summary = h.sender.last_for(USER).await.unwrap();
    assert!(summary.body().contains("Total: 24000 RWF"));
    assert!(!summary.body().contains("COMESA"));
}

#[tokio::test]
async fn test_change_addons_from_summary() {
    let h = Harness::new();
    at_period_step(&h).await;
    h.list(USER, "one_month").await;
    h.button(USER, "confirm_dates").await;
    h.list(USER, "none").await;

    let report = h.button(USER, "change_addons").await;
    assert_eq!(report.state, Some(State::InsuranceAddons));

    let report = h.list(USER, "comesa,personal_accident").await;
    assert_eq!(report.state, Some(State::InsurancePaCategory));
}

#[tokio::test]
async fn test_invalid_inputs_are_reprompted() {
    let h = Harness::new();
    h.list(USER, "insurance").await;
    h.button(USER, "start_quote").await;

    let report = h.text(USER, "ABC").await;
    assert_eq!(report.outcome, DispatchOutcome::Unchanged);
    assert!(h.sender.last_for(USER).await.unwrap().body().contains("RAB123C"));
    assert_eq!(h.stored_state(USER).await, Some(State::InsurancePlate));

    h.text(USER, "RAB123C").await;
    let report = h.text(USER, "01/01/2020").await;
    assert_eq!(report.outcome, DispatchOutcome::Unchanged);
    assert!(h.sender.last_for(USER).await.unwrap().body().contains("past"));

    h.text(USER, &ddmmyyyy(start_date())).await;
    h.list(USER, "one_month").await;
    h.button(USER, "confirm_dates").await;
    let report = h.text(USER, "roadside").await;
    assert_eq!(report.outcome, DispatchOutcome::Unchanged);
    assert!(h.sender.last_for(USER).await.unwrap().body().contains("Unknown add-on"));
}
