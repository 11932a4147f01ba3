//! # Prescription Service
//!
//! Request flow for a new prescription:
//! 1. Validate the issue text
//! 2. Admission check against the latest record
//! 3. Build the prompt
//! 4. One call to the LLM gateway
//! 5. Sanitize and parse the reply
//! 6. Insert-if-absent into the history store
//!
//! A failure in steps 4 or 5 leaves the week's slot unused. The store lock is
//! never held across the remote call, so step 6 re-checks the week and a
//! request that lost a race comes back [`PrescribeOutcome::Blocked`].
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, info, warn};

use crate::{
    admission::{Admission, TimeUntil, check_admission, time_until_next},
    error::AppError,
    gateway::LlmGateway,
    history::{Appended, HistoryStore},
    models::{Context, PrescriptionRecord},
    parse::parse_solution,
    prompt::build_prompt,
    week::{WeekInfo, current_week, next_week_start},
};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrescribeOutcome {
    Created {
        record: PrescriptionRecord,
        week: WeekInfo,
        next_available: DateTime<Local>,
    },
    Blocked(Blocked),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Blocked {
    pub last_prescription_date: DateTime<Utc>,
    pub next_available_date: DateTime<Local>,
    pub time_until_next: TimeUntil,
}

pub struct PrescriptionService {
    store: Arc<dyn HistoryStore>,
    gateway: Arc<dyn LlmGateway>,
    clock: Arc<dyn Clock>,
}

impl PrescriptionService {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        gateway: Arc<dyn LlmGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
        }
    }

    pub async fn availability(&self) -> Admission {
        check_admission(&self.store.snapshot().await, &self.clock.now())
    }

    pub async fn this_week(&self) -> Option<PrescriptionRecord> {
        let key = current_week(&self.clock.now()).key;

        self.store.last().await.filter(|last| last.week_key == key)
    }

    /// Newest first.
    pub async fn history(&self) -> Vec<PrescriptionRecord> {
        let mut prescriptions = self.store.snapshot().await.prescriptions;
        prescriptions.reverse();

        prescriptions
    }

    pub async fn prescribe(
        &self,
        issue: Option<&str>,
        context: Context,
        created_by: Option<String>,
    ) -> Result<PrescribeOutcome, AppError> {
        let issue = issue
            .map(str::trim)
            .filter(|issue| !issue.is_empty())
            .ok_or_else(|| AppError::Validation("Issue description is required".to_string()))?;

        let now = self.clock.now();
        let admission = check_admission(&self.store.snapshot().await, &now);

        if !admission.allowed {
            info!("Weekly prescription already created, blocking");
            return Ok(PrescribeOutcome::Blocked(blocked(&admission, &now)));
        }

        let prompt = build_prompt(issue, &context);
        let raw = self.gateway.complete(&prompt).await.inspect_err(|e| {
            warn!("LLM gateway failed: {e}");
        })?;

        let solution = parse_solution(&raw).inspect_err(|e| {
            warn!("Unparseable AI response: {e}");
            debug!("Raw response: {}", e.raw);
            debug!("Cleaned response: {}", e.cleaned);
        })?;

        let week = current_week(&now);
        let record = PrescriptionRecord {
            issue: issue.to_string(),
            context,
            solution,
            timestamp: now.with_timezone(&Utc),
            week_key: week.key.clone(),
            created_by,
        };

        match self.store.append(record.clone()).await? {
            Appended::Inserted => {
                info!("Created prescription for {}", week.key);

                Ok(PrescribeOutcome::Created {
                    record,
                    next_available: next_week_start(&now),
                    week,
                })
            }
            Appended::Conflict(existing) => {
                warn!("Lost race for {}, another prescription landed first", week.key);

                Ok(PrescribeOutcome::Blocked(Blocked {
                    last_prescription_date: existing.timestamp,
                    next_available_date: next_week_start(&now),
                    time_until_next: time_until_next(&now),
                }))
            }
        }
    }
}

fn blocked(admission: &Admission, now: &DateTime<Local>) -> Blocked {
    Blocked {
        last_prescription_date: admission
            .last_prescription_date
            .unwrap_or_else(|| now.with_timezone(&Utc)),
        next_available_date: admission
            .next_available_date
            .unwrap_or_else(|| next_week_start(now)),
        time_until_next: admission
            .time_until_next
            .unwrap_or_else(|| time_until_next(now)),
    }
}
