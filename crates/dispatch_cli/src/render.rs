//! Spanish chat text for engine outcomes and notifications.

use dispatch_core::notifier::{ClientStatus, NotifyPayload};
use dispatch_core::{CreateOutcome, CreateResult, DriverInfo, ReleaseOutcome, ReplyOutcome, ReplyResult};

pub fn menu() -> String {
    [
        "🚕 ¡Hola! Bienvenido",
        "📋 *Menú de opciones:*",
        "🚕 Escribe *taxi* para solicitar un taxi",
        "Escribe *menu* en cualquier momento para volver aquí",
    ]
    .join("\n")
}

pub fn ask_location() -> String {
    [
        "🚕 ¡Perfecto! Vamos a solicitar tu taxi.",
        "📍 Envía tu *dirección de origen* o tus coordenadas (lat,lng):",
    ]
    .join("\n")
}

pub fn driver_help() -> String {
    "Responde *si* para aceptar, *no* para rechazar o *libre* al terminar la carrera.".to_string()
}

fn driver_line(driver: &DriverInfo) -> String {
    format!("{} (placa {})", driver.name, driver.plate)
}

pub fn create_result(result: &CreateResult) -> String {
    match &result.outcome {
        CreateOutcome::AssignedDriver { driver } => format!(
            "✅ Solicitud {} registrada.\nLe ofrecimos tu carrera a {}. Te avisamos cuando responda.",
            result.request_id,
            driver_line(driver)
        ),
        CreateOutcome::NoDriverAvailable => {
            "😔 No hay conductores disponibles en este momento. Intenta de nuevo en unos minutos."
                .to_string()
        }
        CreateOutcome::InternalError => {
            "❌ No pudimos procesar tu solicitud. Escribe *taxi* para intentar de nuevo.".to_string()
        }
    }
}

/// Answer sent back to the driver who replied.
pub fn reply_result(result: &ReplyResult) -> String {
    match &result.outcome {
        ReplyOutcome::Confirmed => "✅ Carrera confirmada. Dirígete al punto de recogida.".to_string(),
        ReplyOutcome::NoPendingRequest => "No tienes ninguna solicitud pendiente.".to_string(),
        ReplyOutcome::Reassigned { .. } | ReplyOutcome::NoDriverAvailable => {
            "👍 Entendido, la solicitud fue liberada.".to_string()
        }
        ReplyOutcome::InternalError => {
            "❌ Ocurrió un error con la solicitud. Ya fue cancelada.".to_string()
        }
    }
}

pub fn release_outcome(outcome: ReleaseOutcome) -> String {
    match outcome {
        ReleaseOutcome::Released => "🟢 Quedaste disponible para nuevas carreras.".to_string(),
        ReleaseOutcome::NotOnTrip => "Ya estás disponible.".to_string(),
        ReleaseOutcome::StillPending => {
            "Primero responde la solicitud pendiente con *si* o *no*.".to_string()
        }
        ReleaseOutcome::NotFound => "No estás registrado como conductor.".to_string(),
    }
}

pub fn notification(payload: &NotifyPayload) -> String {
    match payload {
        NotifyPayload::DriverOffer {
            request_id,
            client_name,
            location,
            reply_within_secs,
        } => {
            let pickup = location
                .as_ref()
                .map_or_else(|| "sin dirección".to_string(), ToString::to_string);
            format!(
                "🚕 Nueva solicitud {request_id}\nCliente: {client_name}\n📍 Origen: {pickup}\n\
                 Responde *si* o *no* en los próximos {} minutos.",
                reply_within_secs.div_ceil(60)
            )
        }
        NotifyPayload::ClientStatusUpdate { request_id, status } => match status {
            ClientStatus::Confirmed { driver } => format!(
                "✅ ¡Taxi confirmado! {} va en camino. (solicitud {request_id})",
                driver_line(driver)
            ),
            ClientStatus::Reassigned { driver } => format!(
                "🔄 El conductor anterior no pudo atenderte. Ahora le ofrecimos tu carrera a {}.",
                driver_line(driver)
            ),
            ClientStatus::NoDriverAvailable => {
                "😔 Ningún conductor pudo tomar tu carrera. Escribe *taxi* para intentar de nuevo."
                    .to_string()
            }
            ClientStatus::Failed => {
                "❌ Hubo un problema con tu solicitud. Escribe *taxi* para intentar de nuevo."
                    .to_string()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use dispatch_core::{DriverId, RequestId};

    use super::*;

    fn request_id() -> RequestId {
        RequestId {
            created_ms: 1_700_000_000_000,
            sequence: 3,
        }
    }

    #[test]
    fn offer_shows_pickup_and_deadline_in_minutes() {
        let text = notification(&NotifyPayload::DriverOffer {
            request_id: request_id(),
            client_name: "Carla".to_string(),
            location: None,
            reply_within_secs: 120,
        });
        assert!(text.contains("REQ-1700000000000-3"));
        assert!(text.contains("sin dirección"));
        assert!(text.contains("2 minutos"));
    }

    #[test]
    fn driver_confirmation_does_not_promise_client_delivery() {
        let text = reply_result(&ReplyResult {
            request_id: Some(request_id()),
            outcome: ReplyOutcome::Confirmed,
        });
        assert!(text.contains("confirmada"));
        assert!(!text.contains("avisado"));
    }

    #[test]
    fn confirmation_names_driver_and_plate() {
        let text = notification(&NotifyPayload::ClientStatusUpdate {
            request_id: request_id(),
            status: ClientStatus::Confirmed {
                driver: DriverInfo {
                    id: DriverId::from("d1"),
                    name: "Luis".to_string(),
                    plate: "PBA-1234".to_string(),
                },
            },
        });
        assert!(text.contains("Luis (placa PBA-1234)"));
    }
}
