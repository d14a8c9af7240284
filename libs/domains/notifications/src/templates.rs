//! Notification template rendering engine.
//!
//! This module provides Handlebars-based rendering of typed notification
//! events into channel-ready subject/body text, independent of delivery.
//! Required placeholders are checked against an explicit per-event table
//! before rendering, so a missing-variable failure always reports the exact
//! missing keys.

use handlebars::Handlebars;
use serde_json::Value;
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::{NotificationError, NotificationResult};

/// Typed notification events this engine can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationEvent {
    /// Booking confirmed by the business.
    AppointmentConfirmation,
    /// Upcoming appointment reminder.
    AppointmentReminder,
    /// Appointment cancelled.
    AppointmentCancellation,
    /// Appointment moved to a new slot.
    AppointmentRescheduled,
    /// Marketing/promotional campaign message.
    PromotionalOffer,
    /// Operational alert issued by the platform itself.
    SystemAlert,
}

impl NotificationEvent {
    /// Placeholders that must be present in the variable map.
    pub fn required_variables(self) -> &'static [&'static str] {
        match self {
            NotificationEvent::AppointmentConfirmation => &[
                "recipient_name",
                "business_name",
                "service_name",
                "appointment_date",
                "appointment_time",
            ],
            NotificationEvent::AppointmentReminder => &[
                "recipient_name",
                "business_name",
                "appointment_date",
                "appointment_time",
            ],
            NotificationEvent::AppointmentCancellation => {
                &["recipient_name", "business_name", "appointment_date"]
            }
            NotificationEvent::AppointmentRescheduled => &[
                "recipient_name",
                "business_name",
                "old_date",
                "new_date",
                "new_time",
            ],
            NotificationEvent::PromotionalOffer => {
                &["recipient_name", "business_name", "offer_text"]
            }
            NotificationEvent::SystemAlert => &["recipient_name", "alert_text"],
        }
    }
}

/// Rendered notification content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Template engine for rendering notification events.
pub struct TemplateEngine {
    handlebars: Arc<Handlebars<'static>>,
}

/// Fallback language used when no localized template is registered.
pub const FALLBACK_LANGUAGE: &str = "en";

impl TemplateEngine {
    /// Create a new template engine with all templates registered.
    pub fn new() -> NotificationResult<Self> {
        let mut handlebars = Handlebars::new();

        for (name, template) in TEMPLATES {
            handlebars
                .register_template_string(name, *template)
                .map_err(|e| {
                    NotificationError::Template(format!("Failed to register {}: {}", name, e))
                })?;
        }

        Ok(Self {
            handlebars: Arc::new(handlebars),
        })
    }

    /// Variables required by the event but absent (or null) in the map,
    /// deterministically sorted.
    pub fn missing_variables(&self, event: NotificationEvent, variables: &Value) -> Vec<String> {
        let mut missing: Vec<String> = event
            .required_variables()
            .iter()
            .filter(|key| {
                !matches!(variables.get(**key), Some(v) if !v.is_null())
            })
            .map(|key| key.to_string())
            .collect();
        missing.sort_unstable();
        missing
    }

    /// Render an event with the given variables into subject and body.
    ///
    /// Falls back to the `en` templates when the requested language has no
    /// registered variant.
    pub fn render(
        &self,
        event: NotificationEvent,
        variables: &Value,
        language: &str,
    ) -> NotificationResult<RenderedMessage> {
        let missing = self.missing_variables(event, variables);
        if !missing.is_empty() {
            return Err(NotificationError::MissingTemplateVariables(missing));
        }

        debug!(event = %event, language = %language, "Rendering notification template");

        let subject = self.render_part(event, language, "subject", variables)?;
        let body = self.render_part(event, language, "body", variables)?;

        Ok(RenderedMessage { subject, body })
    }

    fn render_part(
        &self,
        event: NotificationEvent,
        language: &str,
        part: &str,
        variables: &Value,
    ) -> NotificationResult<String> {
        let localized = format!("{}.{}.{}", event, language, part);
        let name = if self.handlebars.get_template(&localized).is_some() {
            localized
        } else {
            format!("{}.{}.{}", event, FALLBACK_LANGUAGE, part)
        };
        self.handlebars
            .render(&name, variables)
            .map_err(|e| NotificationError::Template(e.to_string()))
    }
}

// ============================================================================
// Notification Templates
// ============================================================================

const TEMPLATES: &[(&str, &str)] = &[
    (
        "appointment_confirmation.en.subject",
        "Your appointment at {{business_name}} is confirmed",
    ),
    (
        "appointment_confirmation.en.body",
        "Hi {{recipient_name}},\n\nYour {{service_name}} appointment at {{business_name}} is confirmed for {{appointment_date}} at {{appointment_time}}.{{#if notes}}\n\nNote: {{notes}}{{/if}}\n\nSee you soon!",
    ),
    (
        "appointment_confirmation.fr.subject",
        "Votre rendez-vous chez {{business_name}} est confirm\u{e9}",
    ),
    (
        "appointment_confirmation.fr.body",
        "Bonjour {{recipient_name}},\n\nVotre rendez-vous {{service_name}} chez {{business_name}} est confirm\u{e9} le {{appointment_date}} \u{e0} {{appointment_time}}.\n\n\u{c0} bient\u{f4}t !",
    ),
    (
        "appointment_reminder.en.subject",
        "Reminder: appointment at {{business_name}} on {{appointment_date}}",
    ),
    (
        "appointment_reminder.en.body",
        "Hi {{recipient_name}},\n\nThis is a reminder of your appointment at {{business_name}} on {{appointment_date}} at {{appointment_time}}.\n\nNeed to reschedule? Reply to this message or contact the business directly.",
    ),
    (
        "appointment_cancellation.en.subject",
        "Your appointment at {{business_name}} was cancelled",
    ),
    (
        "appointment_cancellation.en.body",
        "Hi {{recipient_name}},\n\nYour appointment at {{business_name}} on {{appointment_date}} has been cancelled.{{#if reason}}\n\nReason: {{reason}}{{/if}}\n\nYou can book a new slot at any time.",
    ),
    (
        "appointment_rescheduled.en.subject",
        "Your appointment at {{business_name}} was moved",
    ),
    (
        "appointment_rescheduled.en.body",
        "Hi {{recipient_name}},\n\nYour appointment at {{business_name}} originally planned for {{old_date}} has been moved to {{new_date}} at {{new_time}}.\n\nIf the new slot does not work for you, please get in touch.",
    ),
    (
        "promotional_offer.en.subject",
        "{{business_name}} has an offer for you",
    ),
    (
        "promotional_offer.en.body",
        "Hi {{recipient_name}},\n\n{{offer_text}}\n\n\u{2014} {{business_name}}",
    ),
    (
        "system_alert.en.subject",
        "Important notice about your account",
    ),
    (
        "system_alert.en.body",
        "Hi {{recipient_name}},\n\n{{alert_text}}\n\nThis is a system notification; no action is needed unless stated above.",
    ),
];
