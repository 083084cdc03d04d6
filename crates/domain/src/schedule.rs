use crate::message::MessageSnapshot;
use crate::recurrence::{NextFire, Recurrence};
use crate::shared::entity::{Entity, ID};

/// A `Schedule` is a persisted commitment to deliver one message payload to
/// a webhook endpoint at one or more future instants. All timestamps are
/// epoch millis.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub id: ID,
    /// The `User` owning this schedule, used for quota and isolation
    pub user_id: ID,
    /// Snapshot of the content to deliver
    pub message: MessageSnapshot,
    /// Validated webhook endpoint
    pub target_url: String,
    /// The originally requested first fire
    pub scheduled_at: i64,
    pub recurrence: Recurrence,
    /// Upper bound on total firings, None = unlimited
    pub max_executions: Option<u32>,
    pub execution_count: u32,
    /// None once the schedule has terminated
    pub next_execution_at: Option<i64>,
    /// Most recent firing attempt, successful or not
    pub last_executed_at: Option<i64>,
    pub is_active: bool,
    /// Bumped on every successful claim. This is what makes two dispatcher
    /// passes racing on the same due row resolve to exactly one execution.
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Schedule {
    pub fn new(
        user_id: ID,
        message: MessageSnapshot,
        target_url: String,
        scheduled_at: i64,
        recurrence: Recurrence,
        now: i64,
    ) -> Self {
        Self {
            id: Default::default(),
            user_id,
            message,
            target_url,
            scheduled_at,
            recurrence,
            max_executions: None,
            execution_count: 0,
            next_execution_at: Some(scheduled_at),
            last_executed_at: None,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_due(&self, now: i64) -> bool {
        self.is_active && self.next_execution_at.map_or(false, |at| at <= now)
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.next_execution_at = None;
    }

    /// True once the execution cap leaves no firings. A cap can drop
    /// to or below the current count through an update, so the dispatcher
    /// checks this before delivering, not only after.
    pub fn is_exhausted(&self) -> bool {
        self.max_executions
            .map_or(false, |max| self.execution_count >= max)
    }

    /// Records one firing attempt and advances or terminates the schedule.
    /// A failed delivery is recorded exactly like a successful one: it
    /// counts against `max_executions` and the cadence moves on, the engine
    /// never replays a missed occurrence.
    pub fn register_execution(&mut self, now: i64, next: NextFire) {
        self.execution_count += 1;
        self.last_executed_at = Some(now);
        self.updated_at = now;

        let exhausted = matches!(self.recurrence, Recurrence::Once) || self.is_exhausted();

        match next {
            NextFire::At(at) if !exhausted => self.next_execution_at = Some(at),
            _ => self.deactivate(),
        }
    }
}

impl Entity for Schedule {
    fn id(&self) -> &ID {
        &self.id
    }
}
