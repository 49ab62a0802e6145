//! Notification dispatcher.
//!
//! Maps a committed transition to the rooms that must hear about it,
//! publishes through the relay, and invokes the durable SMS fallback
//! for the transitions that require one. The mapping itself is a pure
//! function ([`routes_for`]); the dispatcher adds the side effects.
//!
//! Side effects are best effort: a dropped relay delivery or a failed
//! SMS is observable only in logs and metrics, never in the outcome of
//! the operation that triggered it.

use crate::models::Appointment;
use crate::services::sms::{SmsChannel, SmsError};
use event_fabric::{RelayHandle, RoomKey};
use serde_json::{json, Value};
use std::sync::Arc;

/// A committed state-machine transition, as seen by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Created,
    ConfirmationRequested,
    DoctorConfirmed,
    PaymentRecorded,
    Rescheduled,
    Cancelled,
    StatusUpdated,
    BillingUpdated,
}

/// One relay delivery produced by the transition mapping.
#[derive(Debug, Clone)]
pub struct Route {
    pub room: RoomKey,
    pub event: &'static str,
    pub payload: Value,
}

/// Pure mapping from (transition, appointment-after-state) to the list
/// of room deliveries. The patient room is addressed by patient id and
/// skipped for appointments raised without a patient reference.
pub fn routes_for(transition: Transition, appointment: &Appointment) -> Vec<Route> {
    let payload = json!({ "appointment": appointment });
    let patient_room = appointment.patient_id.map(|p| RoomKey::patient(p.0));
    let doctor_room = RoomKey::doctor(&appointment.doctor_name);

    let mut routes = Vec::new();
    match transition {
        Transition::Created => {
            routes.push(Route {
                room: RoomKey::admins(),
                event: "new_appointment_request",
                payload,
            });
        }
        Transition::ConfirmationRequested => {
            routes.push(Route {
                room: doctor_room,
                event: "doctor_confirmation_request",
                payload,
            });
        }
        Transition::DoctorConfirmed => {
            routes.push(Route {
                room: RoomKey::admins(),
                event: "appointment_confirmed",
                payload: payload.clone(),
            });
            if let Some(room) = patient_room {
                routes.push(Route {
                    room,
                    event: "payment_request",
                    payload: json!({
                        "appointment": appointment,
                        "amount": appointment.consultation_fee,
                    }),
                });
            }
        }
        Transition::PaymentRecorded => {
            routes.push(Route {
                room: doctor_room,
                event: "appointment_paid",
                payload: payload.clone(),
            });
            routes.push(Route {
                room: RoomKey::admins(),
                event: "appointment_paid",
                payload,
            });
        }
        Transition::Rescheduled => {
            if let Some(room) = patient_room {
                routes.push(Route {
                    room,
                    event: "appointment_scheduled",
                    payload,
                });
            }
        }
        Transition::Cancelled => {
            if let Some(room) = patient_room {
                routes.push(Route {
                    room,
                    event: "appointment_cancelled",
                    payload,
                });
            }
        }
        Transition::StatusUpdated => {
            routes.push(Route {
                room: RoomKey::admins(),
                event: "appointment_status_updated",
                payload: payload.clone(),
            });
            if let Some(room) = patient_room {
                routes.push(Route {
                    room,
                    event: "appointment_status_updated",
                    payload,
                });
            }
        }
        Transition::BillingUpdated => {
            routes.push(Route {
                room: RoomKey::admins(),
                event: "billing_status_updated",
                payload,
            });
        }
    }
    routes
}

/// SMS template for transitions with a durable fallback, if any.
fn sms_template(transition: Transition) -> Option<&'static str> {
    match transition {
        Transition::Rescheduled => Some("appointment_scheduled"),
        Transition::Cancelled => Some("appointment_cancelled"),
        _ => None,
    }
}

/// Publishes transition notifications and triggers the SMS fallback.
#[derive(Clone)]
pub struct Dispatcher {
    relay: RelayHandle,
    sms: Arc<dyn SmsChannel>,
}

impl Dispatcher {
    pub fn new(relay: RelayHandle, sms: Arc<dyn SmsChannel>) -> Self {
        Self { relay, sms }
    }

    /// Fan a committed transition out to its rooms, then enqueue the
    /// durable fallback where one is defined. Never fails: a transition
    /// that committed stays committed regardless of delivery outcome.
    pub async fn dispatch(&self, transition: Transition, appointment: &Appointment) {
        for route in routes_for(transition, appointment) {
            match self.relay.publish(route.room, route.event, route.payload).await {
                Ok(delivered) => {
                    tracing::debug!(
                        target: "ward.dispatcher",
                        appointment_id = %appointment.id,
                        event = route.event,
                        delivered = delivered,
                        "Published transition event"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        target: "ward.dispatcher",
                        appointment_id = %appointment.id,
                        event = route.event,
                        error = %e,
                        "Failed to publish transition event"
                    );
                }
            }
        }

        if let Some(template) = sms_template(transition) {
            self.send_sms_fallback(template, appointment);
        }
    }

    /// Publish a queue movement to the doctor and admin rooms.
    pub async fn publish_queue_update(&self, doctor_name: &str, payload: Value) {
        for room in [RoomKey::doctor(doctor_name), RoomKey::admins()] {
            if let Err(e) = self
                .relay
                .publish(room, "queue_update", payload.clone())
                .await
            {
                tracing::error!(
                    target: "ward.dispatcher",
                    doctor = %doctor_name,
                    error = %e,
                    "Failed to publish queue update"
                );
            }
        }
    }

    /// Enqueue a best-effort SMS and return immediately. The send's
    /// own success or failure surfaces only through logs.
    fn send_sms_fallback(&self, template: &'static str, appointment: &Appointment) {
        let Some(phone) = appointment.patient_phone.clone() else {
            tracing::debug!(
                target: "ward.dispatcher",
                appointment_id = %appointment.id,
                template = template,
                "No patient phone on record, skipping SMS fallback"
            );
            return;
        };

        let sms = Arc::clone(&self.sms);
        let appointment_id = appointment.id;
        let data = json!({
            "patient_name": appointment.patient_name,
            "doctor_name": appointment.doctor_name,
            "scheduled_time": appointment.scheduled_time,
            "reason": appointment.reason,
        });

        tokio::spawn(async move {
            match sms.send(&phone, template, &data).await {
                Ok(()) => {
                    tracing::info!(
                        target: "ward.dispatcher",
                        appointment_id = %appointment_id,
                        template = template,
                        "SMS fallback sent"
                    );
                }
                Err(SmsError::Disabled) => {
                    tracing::debug!(
                        target: "ward.dispatcher",
                        appointment_id = %appointment_id,
                        "SMS channel not configured, fallback skipped"
                    );
                }
                Err(SmsError::Gateway(e)) => {
                    tracing::warn!(
                        target: "ward.dispatcher",
                        appointment_id = %appointment_id,
                        template = template,
                        error = %e,
                        "SMS fallback failed"
                    );
                }
            }
        });
    }
}
