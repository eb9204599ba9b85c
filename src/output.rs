use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thingbuf::mpsc::errors::TrySendError;
use thingbuf::mpsc::{Receiver, Sender};

use crate::config::OutputMode;

const BPM_UNIT: &str = "beats/minute";

#[derive(Debug, Clone, PartialEq)]
pub enum UploadRequest {
    Reading {
        patient_id: String,
        bpm: f32,
        timestamp: Option<DateTime<Utc>>,
        notes: Option<String>,
    },
    Summary {
        patient_id: String,
        summary_json: String,
    },
}

impl UploadRequest {
    fn kind(&self) -> UploadKind {
        match self {
            UploadRequest::Reading { .. } => UploadKind::Reading,
            UploadRequest::Summary { .. } => UploadKind::Summary,
        }
    }

    fn bpm(&self) -> Option<f32> {
        match self {
            UploadRequest::Reading { bpm, .. } => Some(*bpm),
            UploadRequest::Summary { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadKind {
    #[default]
    Reading,
    Summary,
}

/// Reported back to the control loop once a request has been handled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UploadOutcome {
    pub kind: UploadKind,
    pub bpm: Option<f32>,
    pub success: bool,
}

#[derive(Debug, Serialize)]
struct ObservationRecord<'a> {
    patient_id: &'a str,
    kind: &'static str,
    effective: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

fn observation_record(request: &UploadRequest) -> ObservationRecord<'_> {
    match request {
        UploadRequest::Reading {
            patient_id,
            bpm,
            timestamp,
            notes,
        } => ObservationRecord {
            patient_id,
            kind: "heart-rate",
            effective: timestamp
                .unwrap_or_else(Utc::now)
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            value: Some(*bpm),
            unit: Some(BPM_UNIT),
            notes: notes.as_deref(),
        },
        UploadRequest::Summary {
            patient_id,
            summary_json,
        } => ObservationRecord {
            patient_id,
            kind: "session-summary",
            effective: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            value: None,
            unit: None,
            notes: Some(summary_json.as_str()),
        },
    }
}

pub async fn send_output(mode: OutputMode, request: &UploadRequest) -> anyhow::Result<()> {
    match mode {
        OutputMode::Log => match request {
            UploadRequest::Reading {
                patient_id, bpm, ..
            } => {
                log::info!("Heart rate for {}: {} BPM", patient_id, bpm);
            }
            UploadRequest::Summary {
                patient_id,
                summary_json,
            } => {
                log::info!("Session summary for {}: {}", patient_id, summary_json);
            }
        },
        OutputMode::Json => {
            let line = serde_json::to_string(&observation_record(request))
                .context("Failed to encode observation record")?;
            println!("{}", line);
        }
    }
    Ok(())
}

/// Drains upload requests until every sender is gone, reporting each result back.
pub async fn run_uploader(
    mode: OutputMode,
    requests: Receiver<Option<UploadRequest>>,
    outcomes: Sender<UploadOutcome>,
) -> usize {
    log::info!("Upload task started (mode: {:?})", mode);
    let mut handled = 0;

    while let Some(request) = requests.recv().await {
        let Some(request) = request else {
            continue;
        };

        let success = match send_output(mode, &request).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to upload {:?}: {:#}", request.kind(), e);
                false
            }
        };
        handled += 1;

        let outcome = UploadOutcome {
            kind: request.kind(),
            bpm: request.bpm(),
            success,
        };
        match outcomes.try_send(outcome) {
            Ok(_) => {}
            Err(TrySendError::Closed(_)) => {
                log::debug!("Session already finished, {:?} outcome not reported", outcome.kind);
            }
            Err(e) => log::warn!("Failed to report upload outcome: {:?}", e),
        }
    }

    log::info!("Upload task finished after {} request(s)", handled);
    handled
}
