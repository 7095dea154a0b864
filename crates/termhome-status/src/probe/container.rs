//! Container state probe.

use super::ProbeOutcome;
use crate::runtime::{ContainerSnapshot, Health};
use crate::state::State;

/// Classify a container from its health flag, then its status text.
#[must_use]
pub fn classify_container(container: &ContainerSnapshot) -> ProbeOutcome {
    let status = container.status.as_str();

    match container.health {
        Health::Healthy => return ProbeOutcome::new(State::Ok, "Up (healthy)"),
        Health::Unhealthy => {
            return ProbeOutcome::critical(format!("Unhealthy ({status})"));
        }
        Health::Starting | Health::None => {}
    }

    if status.starts_with("Up") {
        ProbeOutcome::new(State::Ok, format!("Running ({status})"))
    } else if status.starts_with("Exited (0)") {
        // One-off containers finish with 0.
        ProbeOutcome::new(State::Warning, format!("Exited ({status})"))
    } else if status.starts_with("Exited") || status.contains("Dead") {
        ProbeOutcome::critical(format!("Stopped ({status})"))
    } else if status.contains("Restarting") {
        ProbeOutcome::new(State::Warning, format!("Restarting ({status})"))
    } else {
        ProbeOutcome::new(State::Unknown, format!("Unknown ({status})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn container(status: &str, health: Health) -> ContainerSnapshot {
        ContainerSnapshot {
            status: status.to_string(),
            health,
            ..ContainerSnapshot::named("web")
        }
    }

    #[test]
    fn health_flag_wins() {
        let healthy = classify_container(&container("Up 3 hours (healthy)", Health::Healthy));
        assert_eq!(healthy.state, State::Ok);
        assert_eq!(healthy.message, "Up (healthy)");

        let sick = classify_container(&container("Up 3 hours (unhealthy)", Health::Unhealthy));
        assert_eq!(sick.state, State::Critical);
        assert_eq!(sick.message, "Unhealthy (Up 3 hours (unhealthy))");
    }

    #[test]
    fn status_text_table() {
        let cases = [
            ("Up 2 minutes", State::Ok),
            ("Up 5 seconds (health: starting)", State::Ok),
            ("Exited (0) 2 hours ago", State::Warning),
            ("Exited (137) 5 minutes ago", State::Critical),
            ("Dead", State::Critical),
            ("Restarting (1) 3 seconds ago", State::Warning),
            ("Created", State::Unknown),
        ];
        for (status, expected) in cases {
            let outcome = classify_container(&container(status, Health::None));
            assert_eq!(outcome.state, expected, "status {status:?}");
        }
    }

    #[test]
    fn unknown_echoes_status() {
        let outcome = classify_container(&container("Paused", Health::None));
        assert_eq!(outcome.message, "Unknown (Paused)");
    }

    proptest! {
        #[test]
        fn running_without_health_is_ok(suffix in "[a-z0-9 ]{0,20}") {
            let outcome = classify_container(&container(&format!("Up {suffix}"), Health::None));
            prop_assert_eq!(outcome.state, State::Ok);
        }
    }
}
