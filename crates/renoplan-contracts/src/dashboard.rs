use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A generated visual artifact (visualization or blueprint) as delivered by
/// the image service: base64 payload plus its mime type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub base64_data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Visualization,
    Blueprint,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Visualization => "visualization",
            AssetKind::Blueprint => "blueprint",
        }
    }
}

/// Per-slot generation state machine: idle -> in-flight -> succeeded|failed,
/// re-enterable from either terminal state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AssetState {
    #[default]
    Idle,
    InFlight,
    Succeeded(GeneratedImage),
    Failed(String),
}

/// Issued by `begin`; captures the epoch at issue time so a result landing
/// after a reset can be recognized as stale and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTicket {
    epoch: u64,
    phase: usize,
    kind: AssetKind,
}

impl GenerationTicket {
    pub fn phase(&self) -> usize {
        self.phase
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }
}

const IDLE: AssetState = AssetState::Idle;

/// Session-lifetime view state for generated assets, keyed by phase index
/// and asset kind. Each slot is independent; a failure in one never touches
/// another, and nothing here ever mutates the plan itself.
#[derive(Debug, Default)]
pub struct DashboardState {
    epoch: u64,
    slots: IndexMap<(usize, AssetKind), AssetState>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn state(&self, phase: usize, kind: AssetKind) -> &AssetState {
        self.slots.get(&(phase, kind)).unwrap_or(&IDLE)
    }

    /// The generated artifact for a slot, if and only if it succeeded. A
    /// failed slot yields `None`, never a broken image reference.
    pub fn generated(&self, phase: usize, kind: AssetKind) -> Option<&GeneratedImage> {
        match self.state(phase, kind) {
            AssetState::Succeeded(image) => Some(image),
            _ => None,
        }
    }

    /// Marks a slot in-flight and returns the ticket its completion must
    /// present. Re-entering from a terminal state is allowed (retry).
    pub fn begin(&mut self, phase: usize, kind: AssetKind) -> GenerationTicket {
        self.slots.insert((phase, kind), AssetState::InFlight);
        GenerationTicket {
            epoch: self.epoch,
            phase,
            kind,
        }
    }

    /// Applies a completion. Returns false and changes nothing when the
    /// ticket predates the current epoch (the session was reset while the
    /// call was in flight).
    pub fn complete(
        &mut self,
        ticket: GenerationTicket,
        result: Result<GeneratedImage, String>,
    ) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        let state = match result {
            Ok(image) => AssetState::Succeeded(image),
            Err(detail) => AssetState::Failed(detail),
        };
        self.slots.insert((ticket.phase, ticket.kind), state);
        true
    }

    /// Clears every slot and advances the epoch so in-flight results from
    /// the previous session are discarded on arrival.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{AssetKind, AssetState, DashboardState, GeneratedImage};

    fn image(tag: &str) -> GeneratedImage {
        GeneratedImage {
            mime_type: "image/png".to_string(),
            base64_data: tag.to_string(),
        }
    }

    #[test]
    fn slot_walks_idle_inflight_succeeded() {
        let mut state = DashboardState::new();
        assert_eq!(
            state.state(0, AssetKind::Visualization),
            &AssetState::Idle
        );

        let ticket = state.begin(0, AssetKind::Visualization);
        assert_eq!(
            state.state(0, AssetKind::Visualization),
            &AssetState::InFlight
        );

        assert!(state.complete(ticket, Ok(image("a"))));
        assert_eq!(
            state.generated(0, AssetKind::Visualization),
            Some(&image("a"))
        );
    }

    #[test]
    fn failed_slot_exposes_no_image() {
        let mut state = DashboardState::new();
        let ticket = state.begin(2, AssetKind::Blueprint);
        assert!(state.complete(ticket, Err("no image produced".to_string())));
        assert_eq!(
            state.state(2, AssetKind::Blueprint),
            &AssetState::Failed("no image produced".to_string())
        );
        assert_eq!(state.generated(2, AssetKind::Blueprint), None);
    }

    #[test]
    fn slots_resolve_independently() {
        let mut state = DashboardState::new();
        let first = state.begin(0, AssetKind::Visualization);
        let second = state.begin(1, AssetKind::Visualization);

        assert!(state.complete(first, Err("transport failure".to_string())));
        assert!(state.complete(second, Ok(image("phase-1"))));

        assert!(matches!(
            state.state(0, AssetKind::Visualization),
            AssetState::Failed(_)
        ));
        assert_eq!(
            state.generated(1, AssetKind::Visualization),
            Some(&image("phase-1"))
        );
    }

    #[test]
    fn visualization_and_blueprint_are_distinct_slots() {
        let mut state = DashboardState::new();
        let viz = state.begin(0, AssetKind::Visualization);
        assert!(state.complete(viz, Ok(image("viz"))));
        assert_eq!(state.state(0, AssetKind::Blueprint), &AssetState::Idle);
    }

    #[test]
    fn stale_ticket_after_reset_is_discarded() {
        let mut state = DashboardState::new();
        let stale = state.begin(0, AssetKind::Visualization);
        state.reset();

        assert!(!state.complete(stale, Ok(image("late"))));
        assert_eq!(state.state(0, AssetKind::Visualization), &AssetState::Idle);
        assert_eq!(state.epoch(), 1);
    }

    #[test]
    fn terminal_states_are_reenterable() {
        let mut state = DashboardState::new();
        let first = state.begin(3, AssetKind::Blueprint);
        assert!(state.complete(first, Err("quota".to_string())));

        let retry = state.begin(3, AssetKind::Blueprint);
        assert_eq!(
            state.state(3, AssetKind::Blueprint),
            &AssetState::InFlight
        );
        assert!(state.complete(retry, Ok(image("second try"))));
        assert_eq!(
            state.generated(3, AssetKind::Blueprint),
            Some(&image("second try"))
        );
    }
}
