//! MoMo payment QR codes for a phone number or a merchant pay code.

use super::{FlowContext, FlowHandler, FlowOutcome, created_once, parse_choice};
use crate::error::Result;
use crate::models::events::InboundEvent;
use crate::models::messages::{ButtonOption, MediaSource};
use crate::models::payments::{AmountMode, QrAmount, QrCodeRecord, QrType, ussd_string};
use crate::services::conversation::context::{ContextPatch, FieldValue};
use crate::services::conversation::state_machine::{FlowType, State};
use crate::validation;
use async_trait::async_trait;
use chrono::Utc;

const ASK_TYPE: &str = "Generate a payment QR code. What should it pay to?";
const ASK_AMOUNT: &str = "Enter the amount in RWF, for example 5000.";

pub struct QrGenerationFlow;

fn identifier_prompt(qr_type: QrType) -> &'static str {
    match qr_type {
        QrType::Phone => "Enter the MoMo phone number, for example 0788123456.",
        QrType::MomoCode => "Enter the MoMo pay code (4 to 9 digits).",
    }
}

impl QrGenerationFlow {
    async fn ask_type(&self, ctx: &FlowContext<'_>) -> Result<()> {
        ctx.buttons(
            ASK_TYPE,
            vec![
                ButtonOption::new(QrType::Phone.to_string(), QrType::Phone.label()),
                ButtonOption::new(QrType::MomoCode.to_string(), QrType::MomoCode.label()),
            ],
        )
        .await
    }

    async fn ask_amount_mode(&self, ctx: &FlowContext<'_>) -> Result<()> {
        ctx.buttons(
            "Should the code carry a fixed amount?",
            vec![
                ButtonOption::new(AmountMode::NoAmount.to_string(), "No amount"),
                ButtonOption::new(AmountMode::WithAmount.to_string(), "Fixed amount"),
            ],
        )
        .await
    }

    async fn on_menu(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let Some(qr_type) = parse_choice::<QrType>(event) else {
            if event.text_body().is_some() || event.selection().is_some() {
                self.ask_type(ctx).await?;
                return Ok(FlowOutcome::Unchanged);
            }
            return Ok(ctx.ignore(event));
        };

        let patch = ContextPatch::from(FieldValue::QrType(qr_type));
        if let Some(outcome) = ctx.guard(State::QrIdentifierInput, &patch) {
            return Ok(outcome);
        }
        ctx.say(identifier_prompt(qr_type)).await?;
        Ok(ctx.commit(State::QrIdentifierInput, patch))
    }

    async fn on_identifier(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let Some(text) = event.text_body() else {
            return Ok(ctx.ignore(event));
        };
        let Some(qr_type) = ctx.machine.context().qr.qr_type else {
            return Ok(ctx.reset("qr type missing"));
        };

        let validated = match qr_type {
            QrType::Phone => validation::validate_phone_number(text),
            QrType::MomoCode => validation::validate_momo_code(text),
        };
        let identifier = match validated {
            Ok(identifier) => identifier,
            Err(e) => return ctx.reject_input(e).await,
        };

        let patch = ContextPatch::from(FieldValue::QrIdentifier(identifier));
        if let Some(outcome) = ctx.guard(State::QrAmountMode, &patch) {
            return Ok(outcome);
        }
        self.ask_amount_mode(ctx).await?;
        Ok(ctx.commit(State::QrAmountMode, patch))
    }

    async fn on_amount_mode(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        match parse_choice::<AmountMode>(event) {
            Some(AmountMode::NoAmount) => {
                let patch = ContextPatch::new().set(FieldValue::AmountMode(AmountMode::NoAmount));
                self.generate(ctx, patch, QrAmount::Open).await
            }
            Some(AmountMode::WithAmount) => {
                let patch = ContextPatch::from(FieldValue::AmountMode(AmountMode::WithAmount));
                if let Some(outcome) = ctx.guard(State::QrAmountInput, &patch) {
                    return Ok(outcome);
                }
                ctx.say(ASK_AMOUNT).await?;
                Ok(ctx.commit(State::QrAmountInput, patch))
            }
            None if event.text_body().is_some() || event.selection().is_some() => {
                self.ask_amount_mode(ctx).await?;
                Ok(FlowOutcome::Unchanged)
            }
            None => Ok(ctx.ignore(event)),
        }
    }

    async fn on_amount(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let Some(text) = event.text_body() else {
            return Ok(ctx.ignore(event));
        };
        match validation::validate_amount(text) {
            Ok(amount) => {
                self.generate(ctx, ContextPatch::new(), QrAmount::Fixed(amount))
                    .await
            }
            Err(e) => ctx.reject_input(e).await,
        }
    }

    /// Renders the code, stores it, sends it, then enters `QR_GENERATED`.
    async fn generate(
        &self,
        ctx: &mut FlowContext<'_>,
        patch: ContextPatch,
        amount: QrAmount,
    ) -> Result<FlowOutcome> {
        let qr_code_id = ctx.record_id("qr_code");
        let patch = patch
            .set(FieldValue::Amount(amount))
            .set(FieldValue::QrCodeId(qr_code_id));
        if let Some(outcome) = ctx.guard(State::QrGenerated, &patch) {
            return Ok(outcome);
        }

        let qr = ctx.machine.context().qr.clone();
        let (Some(qr_type), Some(identifier)) = (qr.qr_type, qr.qr_identifier) else {
            return Ok(ctx.reset("qr details missing"));
        };

        let ussd = ussd_string(qr_type, &identifier, amount);
        let image = ctx.services.qr.render(&ussd).await?;

        created_once(
            ctx.services
                .records
                .create_qr_code(QrCodeRecord {
                    id: qr_code_id,
                    owner: ctx.identity.to_string(),
                    qr_type,
                    identifier: identifier.clone(),
                    amount,
                    ussd: ussd.clone(),
                    created_at: Utc::now(),
                })
                .await,
        )?;

        let amount_line = match amount {
            QrAmount::Open => "Amount: entered by the payer".to_string(),
            QrAmount::Fixed(value) => format!("Amount: {} RWF", value),
        };
        let caption = format!(
            "Scan to pay {}\n{}\nOr dial {}",
            identifier, amount_line, ussd
        );
        ctx.services
            .messages
            .send_image(
                ctx.identity,
                MediaSource::Bytes {
                    data: image,
                    mime_type: "image/png".to_string(),
                },
                Some(caption),
            )
            .await?;
        tracing::info!(identity = %ctx.identity, qr_code_id = %qr_code_id, "[QrGeneration] QR code generated");

        Ok(ctx.commit(State::QrGenerated, patch))
    }
}

#[async_trait]
impl FlowHandler for QrGenerationFlow {
    fn flow(&self) -> FlowType {
        FlowType::QrGeneration
    }

    async fn enter(&self, ctx: &mut FlowContext<'_>) -> Result<()> {
        match (ctx.state(), ctx.machine.context().qr.qr_type) {
            (State::QrIdentifierInput, Some(qr_type)) => ctx.say(identifier_prompt(qr_type)).await,
            (State::QrAmountMode, _) => self.ask_amount_mode(ctx).await,
            (State::QrAmountInput, _) => ctx.say(ASK_AMOUNT).await,
            _ => self.ask_type(ctx).await,
        }
    }

    async fn handle(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        match ctx.state() {
            State::QrMenu => self.on_menu(event, ctx).await,
            State::QrIdentifierInput => self.on_identifier(event, ctx).await,
            State::QrAmountMode => self.on_amount_mode(event, ctx).await,
            State::QrAmountInput => self.on_amount(event, ctx).await,
            _ => Ok(ctx.ignore(event)),
        }
    }
}
