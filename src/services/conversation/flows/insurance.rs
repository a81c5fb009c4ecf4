//! Motor insurance quoting.
//!
//! plate -> start date -> period -> confirm (or edit) dates -> add-ons ->
//! optional PA category -> premium summary -> payment plan -> quote.

use super::{FlowContext, FlowHandler, FlowOutcome, created_once, parse_choice};
use crate::error::Result;
use crate::models::events::InboundEvent;
use crate::models::insurance::{
    Addon, InsurancePeriod, InsuranceQuote, PaCategory, PaymentPlan, quote_premium,
};
use crate::models::messages::{ButtonOption, ListRow, ListSection};
use crate::services::conversation::context::{ContextPatch, FieldValue, InsuranceSlots};
use crate::services::conversation::state_machine::{FlowType, State};
use crate::validation;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use strum::IntoEnumIterator;

const ASK_PLATE: &str = "Enter the vehicle plate number, for example RAB123C.";
const ASK_START: &str = "When should the cover start? Use DD/MM/YYYY.";
const ASK_END: &str = "Enter the new end date (DD/MM/YYYY). Cover can last up to 12 months.";

pub struct InsuranceFlow;

fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn format_rwf(amount: u64) -> String {
    format!("{} RWF", amount)
}

impl InsuranceFlow {
    async fn ask_start_quote(&self, ctx: &FlowContext<'_>) -> Result<()> {
        ctx.buttons(
            "Motor insurance. Get a third-party quote for your vehicle in a few steps.",
            vec![ButtonOption::new("start_quote", "Get a quote")],
        )
        .await
    }

    async fn ask_period(&self, ctx: &FlowContext<'_>) -> Result<()> {
        let rows = InsurancePeriod::iter()
            .map(|p| ListRow::new(p.to_string(), p.label()))
            .collect();
        ctx.list(
            "How long should the cover last?",
            "Choose period",
            vec![ListSection {
                title: "Cover period".to_string(),
                rows,
            }],
        )
        .await
    }

    async fn ask_confirm_dates(&self, ctx: &FlowContext<'_>, start: NaiveDate, end: NaiveDate) -> Result<()> {
        ctx.buttons(
            &format!(
                "Cover from {} to {}. Are these dates correct?",
                format_date(start),
                format_date(end)
            ),
            vec![
                ButtonOption::new("confirm_dates", "Confirm dates"),
                ButtonOption::new("edit_end_date", "Change end date"),
            ],
        )
        .await
    }

    async fn ask_addons(&self, ctx: &FlowContext<'_>) -> Result<()> {
        let rows = vec![
            ListRow::new(Addon::Comesa.to_string(), Addon::Comesa.label())
                .with_description("Regional travel cover"),
            ListRow::new(Addon::PersonalAccident.to_string(), Addon::PersonalAccident.label())
                .with_description("Cover for driver and passengers"),
            ListRow::new("comesa,personal_accident", "Both"),
            ListRow::new("none", "No add-ons"),
        ];
        ctx.list(
            "Third-party liability is included. Add any extras? You can also type them, e.g. comesa, pa",
            "Choose add-ons",
            vec![ListSection {
                title: "Add-ons".to_string(),
                rows,
            }],
        )
        .await
    }

    async fn ask_pa_category(&self, ctx: &FlowContext<'_>) -> Result<()> {
        let rows = PaCategory::iter()
            .map(|c| {
                ListRow::new(c.to_string(), c.label()).with_description(format!(
                    "Benefit {}, premium {}",
                    format_rwf(c.benefit()),
                    format_rwf(c.premium())
                ))
            })
            .collect();
        ctx.list(
            "Choose the personal accident category.",
            "Choose category",
            vec![ListSection {
                title: "PA categories".to_string(),
                rows,
            }],
        )
        .await
    }

    async fn ask_payment_plan(&self, ctx: &FlowContext<'_>) -> Result<()> {
        let options = PaymentPlan::iter()
            .map(|p| ButtonOption::new(p.to_string(), p.label()))
            .collect();
        ctx.buttons("How would you like to pay?", options).await
    }

    /// Premium summary for the slots as they would be after a patch.
    fn summary_text(&self, ctx: &FlowContext<'_>, slots: &InsuranceSlots) -> Option<String> {
        let (start, end) = (slots.start_date?, slots.end_date?);
        let addons = slots.addons.clone().unwrap_or_default();
        let premium = quote_premium(ctx.settings.rates, start, end, &addons, slots.pa_category);

        let mut lines = vec![
            "Quote summary".to_string(),
            format!("Plate: {}", slots.vehicle_plate.as_deref().unwrap_or("-")),
            format!("Cover: {} to {}", format_date(start), format_date(end)),
            format!("Third-party liability: {}", format_rwf(premium.base)),
        ];
        if premium.comesa > 0 {
            lines.push(format!("COMESA yellow card: {}", format_rwf(premium.comesa)));
        }
        if addons.contains(&Addon::PersonalAccident) {
            let category = slots
                .pa_category
                .map(PaCategory::label)
                .unwrap_or_else(|| "-".to_string());
            lines.push(format!(
                "Personal accident ({}): {}",
                category,
                format_rwf(premium.personal_accident)
            ));
        }
        lines.push(format!("Total: {}", format_rwf(premium.total)));
        Some(lines.join("\n"))
    }

    async fn show_summary(&self, ctx: &FlowContext<'_>, slots: &InsuranceSlots) -> Result<bool> {
        let Some(text) = self.summary_text(ctx, slots) else {
            return Ok(false);
        };
        ctx.buttons(
            &text,
            vec![
                ButtonOption::new("accept", "Accept"),
                ButtonOption::new("change_addons", "Change add-ons"),
            ],
        )
        .await?;
        Ok(true)
    }

    /// Moves to the summary, sending the premium breakdown first.
    async fn to_summary(&self, ctx: &mut FlowContext<'_>, patch: ContextPatch) -> Result<FlowOutcome> {
        if let Some(outcome) = ctx.guard(State::InsuranceSummary, &patch) {
            return Ok(outcome);
        }
        let mut preview = ctx.machine.context().clone();
        preview.apply(&patch);
        if !self.show_summary(ctx, &preview.insurance).await? {
            return Ok(ctx.reset("cover dates missing"));
        }
        Ok(ctx.commit(State::InsuranceSummary, patch))
    }

    async fn step_with(
        &self,
        ctx: &mut FlowContext<'_>,
        target: State,
        patch: ContextPatch,
        prompt: &str,
    ) -> Result<FlowOutcome> {
        if let Some(outcome) = ctx.guard(target, &patch) {
            return Ok(outcome);
        }
        ctx.say(prompt).await?;
        Ok(ctx.commit(target, patch))
    }

    async fn on_menu(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        match event.choice().as_deref() {
            Some("start_quote") => {
                self.step_with(ctx, State::InsurancePlate, ContextPatch::new(), ASK_PLATE)
                    .await
            }
            Some(_) => {
                self.ask_start_quote(ctx).await?;
                Ok(FlowOutcome::Unchanged)
            }
            None => Ok(ctx.ignore(event)),
        }
    }

    async fn on_plate(&self, text: &str, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        match validation::validate_plate_number(text) {
            Ok(plate) => {
                self.step_with(
                    ctx,
                    State::InsuranceStartDate,
                    FieldValue::VehiclePlate(plate).into(),
                    ASK_START,
                )
                .await
            }
            Err(e) => ctx.reject_input(e).await,
        }
    }

    async fn on_start_date(&self, text: &str, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let start = match validation::validate_start_date(text, ctx.settings.local_today()) {
            Ok(start) => start,
            Err(e) => return ctx.reject_input(e).await,
        };

        let patch = ContextPatch::from(FieldValue::StartDate(start));
        if let Some(outcome) = ctx.guard(State::InsurancePeriod, &patch) {
            return Ok(outcome);
        }
        self.ask_period(ctx).await?;
        Ok(ctx.commit(State::InsurancePeriod, patch))
    }

    async fn on_period(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let Some(period) = parse_choice::<InsurancePeriod>(event) else {
            if event.text_body().is_some() || event.selection().is_some() {
                self.ask_period(ctx).await?;
                return Ok(FlowOutcome::Unchanged);
            }
            return Ok(ctx.ignore(event));
        };
        let Some(start) = ctx.machine.context().insurance.start_date else {
            return Ok(ctx.reset("start date missing"));
        };
        let Some(end) = period.end_date(start) else {
            return ctx.reprompt("That cover period is out of range. Please choose another.").await;
        };

        let patch = ContextPatch::new()
            .set(FieldValue::Period(period))
            .set(FieldValue::EndDate(end));
        if let Some(outcome) = ctx.guard(State::InsuranceConfirmDates, &patch) {
            return Ok(outcome);
        }
        self.ask_confirm_dates(ctx, start, end).await?;
        Ok(ctx.commit(State::InsuranceConfirmDates, patch))
    }

    async fn on_confirm_dates(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        match event.choice().as_deref() {
            Some("confirm_dates") => {
                let patch = ContextPatch::new();
                if let Some(outcome) = ctx.guard(State::InsuranceAddons, &patch) {
                    return Ok(outcome);
                }
                self.ask_addons(ctx).await?;
                Ok(ctx.commit(State::InsuranceAddons, patch))
            }
            Some("edit_end_date") => {
                self.step_with(ctx, State::InsuranceEditEndDate, ContextPatch::new(), ASK_END)
                    .await
            }
            Some(_) => {
                let dates = {
                    let slots = &ctx.machine.context().insurance;
                    (slots.start_date, slots.end_date)
                };
                let (Some(start), Some(end)) = dates else {
                    return Ok(ctx.reset("cover dates missing"));
                };
                self.ask_confirm_dates(ctx, start, end).await?;
                Ok(FlowOutcome::Unchanged)
            }
            None => Ok(ctx.ignore(event)),
        }
    }

    async fn on_edit_end_date(&self, text: &str, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let Some(start) = ctx.machine.context().insurance.start_date else {
            return Ok(ctx.reset("start date missing"));
        };
        let end = match validation::validate_end_date(text, start) {
            Ok(end) => end,
            Err(e) => return ctx.reject_input(e).await,
        };

        let patch = ContextPatch::from(FieldValue::EndDate(end));
        if let Some(outcome) = ctx.guard(State::InsuranceConfirmDates, &patch) {
            return Ok(outcome);
        }
        self.ask_confirm_dates(ctx, start, end).await?;
        Ok(ctx.commit(State::InsuranceConfirmDates, patch))
    }

    async fn on_addons(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let Some(choice) = event.choice() else {
            return Ok(ctx.ignore(event));
        };
        let addons = match validation::parse_addons(&choice) {
            Ok(addons) => addons,
            Err(e) => return ctx.reject_input(e).await,
        };

        let wants_pa = addons.contains(&Addon::PersonalAccident);
        let patch = ContextPatch::from(FieldValue::Addons(addons));
        if !wants_pa {
            return self.to_summary(ctx, patch).await;
        }

        if let Some(outcome) = ctx.guard(State::InsurancePaCategory, &patch) {
            return Ok(outcome);
        }
        self.ask_pa_category(ctx).await?;
        Ok(ctx.commit(State::InsurancePaCategory, patch))
    }

    async fn on_pa_category(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        match parse_choice::<PaCategory>(event) {
            Some(category) => {
                self.to_summary(ctx, FieldValue::PaCategory(category).into())
                    .await
            }
            None if event.text_body().is_some() || event.selection().is_some() => {
                self.ask_pa_category(ctx).await?;
                Ok(FlowOutcome::Unchanged)
            }
            None => Ok(ctx.ignore(event)),
        }
    }

    async fn on_summary(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        match event.choice().as_deref() {
            Some("accept") => {
                let patch = ContextPatch::new();
                if let Some(outcome) = ctx.guard(State::InsurancePaymentPlan, &patch) {
                    return Ok(outcome);
                }
                self.ask_payment_plan(ctx).await?;
                Ok(ctx.commit(State::InsurancePaymentPlan, patch))
            }
            Some("change_addons") => {
                let patch = ContextPatch::new();
                if let Some(outcome) = ctx.guard(State::InsuranceAddons, &patch) {
                    return Ok(outcome);
                }
                self.ask_addons(ctx).await?;
                Ok(ctx.commit(State::InsuranceAddons, patch))
            }
            Some(_) => {
                let slots = ctx.machine.context().insurance.clone();
                if !self.show_summary(ctx, &slots).await? {
                    return Ok(ctx.reset("cover dates missing"));
                }
                Ok(FlowOutcome::Unchanged)
            }
            None => Ok(ctx.ignore(event)),
        }
    }

    async fn on_payment_plan(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let Some(plan) = parse_choice::<PaymentPlan>(event) else {
            if event.text_body().is_some() || event.selection().is_some() {
                self.ask_payment_plan(ctx).await?;
                return Ok(FlowOutcome::Unchanged);
            }
            return Ok(ctx.ignore(event));
        };

        let quote_id = ctx.record_id("quote");
        let patch = ContextPatch::new()
            .set(FieldValue::PaymentPlan(plan))
            .set(FieldValue::QuoteId(quote_id));
        if let Some(outcome) = ctx.guard(State::InsuranceQuoteReady, &patch) {
            return Ok(outcome);
        }

        let slots = ctx.machine.context().insurance.clone();
        let (Some(vehicle_plate), Some(start_date), Some(end_date), Some(addons)) =
            (slots.vehicle_plate, slots.start_date, slots.end_date, slots.addons)
        else {
            return Ok(ctx.reset("quote details missing"));
        };
        let pa_category = slots
            .pa_category
            .filter(|_| addons.contains(&Addon::PersonalAccident));
        let premium = quote_premium(ctx.settings.rates, start_date, end_date, &addons, pa_category);

        created_once(
            ctx.services
                .records
                .create_quote(InsuranceQuote {
                    id: quote_id,
                    owner: ctx.identity.to_string(),
                    vehicle_plate: vehicle_plate.clone(),
                    start_date,
                    end_date,
                    addons,
                    pa_category,
                    payment_plan: plan,
                    premium,
                    created_at: Utc::now(),
                })
                .await,
        )?;
        tracing::info!(identity = %ctx.identity, quote_id = %quote_id, total = premium.total, "[Insurance] Quote created");

        let installments = plan
            .schedule(premium.total)
            .into_iter()
            .map(format_rwf)
            .collect::<Vec<_>>()
            .join(" + ");
        ctx.say(&format!(
            "Your quote for {} is ready.\nTotal premium: {}\nPayment: {} ({})\nReference: {}\nAn agent will contact you to complete payment. Type menu for more services.",
            vehicle_plate,
            format_rwf(premium.total),
            plan.label(),
            installments,
            quote_id
        ))
        .await?;
        Ok(ctx.commit(State::InsuranceQuoteReady, patch))
    }
}

#[async_trait]
impl FlowHandler for InsuranceFlow {
    fn flow(&self) -> FlowType {
        FlowType::Insurance
    }

    async fn enter(&self, ctx: &mut FlowContext<'_>) -> Result<()> {
        match ctx.state() {
            State::InsurancePlate => ctx.say(ASK_PLATE).await,
            State::InsuranceStartDate => ctx.say(ASK_START).await,
            State::InsurancePeriod => self.ask_period(ctx).await,
            State::InsuranceEditEndDate => ctx.say(ASK_END).await,
            State::InsuranceAddons => self.ask_addons(ctx).await,
            State::InsurancePaCategory => self.ask_pa_category(ctx).await,
            State::InsurancePaymentPlan => self.ask_payment_plan(ctx).await,
            _ => self.ask_start_quote(ctx).await,
        }
    }

    async fn handle(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let state = ctx.state();
        let text = event.text_body();

        match (state, text) {
            (State::InsuranceMenu, _) => self.on_menu(event, ctx).await,
            (State::InsurancePlate, Some(text)) => self.on_plate(text, ctx).await,
            (State::InsuranceStartDate, Some(text)) => self.on_start_date(text, ctx).await,
            (State::InsurancePeriod, _) => self.on_period(event, ctx).await,
            (State::InsuranceConfirmDates, _) => self.on_confirm_dates(event, ctx).await,
            (State::InsuranceEditEndDate, Some(text)) => self.on_edit_end_date(text, ctx).await,
            (State::InsuranceAddons, _) => self.on_addons(event, ctx).await,
            (State::InsurancePaCategory, _) => self.on_pa_category(event, ctx).await,
            (State::InsuranceSummary, _) => self.on_summary(event, ctx).await,
            (State::InsurancePaymentPlan, _) => self.on_payment_plan(event, ctx).await,
            (State::InsurancePlate | State::InsuranceStartDate | State::InsuranceEditEndDate, None)
                if event.selection().is_some() =>
            {
                self.enter(ctx).await?;
                Ok(FlowOutcome::Unchanged)
            }
            _ => Ok(ctx.ignore(event)),
        }
    }
}
