//! Candidate entities for the link selection prompt

use drawmyhome_hass::EntityStateSource;
use serde::Serialize;
use tracing::debug;

use crate::config::EntityRef;

/// One selectable entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityChoice {
    pub entity_id: String,
    /// Friendly name, or the entity id when there is none
    pub name: String,
}

/// Lists entities a device can be linked to
pub struct EntityCatalog {
    configured: Vec<String>,
}

impl EntityCatalog {
    pub fn new(configured: &[EntityRef]) -> Self {
        Self {
            configured: configured.iter().map(|e| e.entity_id().to_string()).collect(),
        }
    }

    /// Choices in display order, optionally restricted to one domain.
    ///
    /// Configured entities take precedence over the full entity list.
    /// Entities without a current state are left out.
    pub fn choices(&self, source: &dyn EntityStateSource, domain: Option<&str>) -> Vec<EntityChoice> {
        let candidates = if self.configured.is_empty() {
            source.entity_ids()
        } else {
            self.configured.clone()
        };

        let prefix = domain.filter(|d| !d.is_empty()).map(|d| format!("{d}."));
        candidates
            .into_iter()
            .filter(|id| prefix.as_ref().map_or(true, |p| id.starts_with(p.as_str())))
            .filter_map(|id| {
                let Some(state) = source.state(&id) else {
                    debug!(entity = %id, "Skipping entity without state");
                    return None;
                };
                Some(EntityChoice {
                    name: state.display_name().to_string(),
                    entity_id: id,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawmyhome_hass::{EntityState, StateHub};
    use serde_json::json;

    fn hub() -> StateHub {
        let hub = StateHub::new();
        hub.set_state(
            EntityState::new("light.kitchen", "on").with_attribute("friendly_name", json!("Kitchen")),
        );
        hub.set_state(EntityState::new("switch.fan", "off"));
        hub.set_state(EntityState::new("sensor.temp", "21"));
        hub
    }

    #[test]
    fn test_all_entities_when_unconfigured() {
        let catalog = EntityCatalog::new(&[]);
        let choices = catalog.choices(&hub(), None);
        let ids: Vec<&str> = choices.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(ids, ["light.kitchen", "sensor.temp", "switch.fan"]);
        assert_eq!(choices[0].name, "Kitchen");
        assert_eq!(choices[1].name, "sensor.temp");
    }

    #[test]
    fn test_configured_entities_skip_missing() {
        let catalog = EntityCatalog::new(&[
            EntityRef::Id("switch.fan".to_string()),
            EntityRef::Entry {
                entity: "light.gone".to_string(),
            },
        ]);
        let choices = catalog.choices(&hub(), None);
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].entity_id, "switch.fan");
    }

    #[test]
    fn test_domain_filter() {
        let catalog = EntityCatalog::new(&[]);
        let choices = catalog.choices(&hub(), Some("light"));
        assert_eq!(choices.len(), 1);
        assert_eq!(catalog.choices(&hub(), Some("")).len(), 3);
    }
}
