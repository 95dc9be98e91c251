//! Lifecycle, event ordering and deferred-removal scenarios for the World

use std::cell::RefCell;
use std::rc::Rc;

use crate::ecs::components::Velocity;
use crate::ecs::{ComponentBundle, EntityId, System, SystemError, World, WorldState};
use crate::events::{BusEvent, EventKind, WorldEvent};

#[derive(Debug, Clone, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Health(i32);

type Journal = Rc<RefCell<Vec<String>>>;

fn record_everything(world: &mut World) -> Journal {
    let journal: Journal = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&journal);
    world.on_any(move |_, event| {
        let line = match event.entity() {
            Some(entity) => format!("{}:{}", event.kind(), entity),
            None => event.kind().to_string(),
        };
        sink.borrow_mut().push(line);
    });
    journal
}

/// Destroys every entity tagged "doomed"
struct Reaper;

impl System for Reaper {
    fn name(&self) -> &str {
        "reaper"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn update(&mut self, world: &mut World, _delta_time: f32) -> Result<(), SystemError> {
        for entity in world.entities_by_tag("doomed") {
            world.destroy_entity(entity);
        }
        Ok(())
    }
}

/// Lower-priority system that reads positions after the reaper ran
struct Observer {
    journal: Journal,
}

impl System for Observer {
    fn name(&self) -> &str {
        "observer"
    }

    fn update(&mut self, world: &mut World, _delta_time: f32) -> Result<(), SystemError> {
        for entity in world.query(&["Position"]) {
            let exists = world.entity_exists(entity);
            let position = world.get_component::<Position>(entity, "Position").cloned();
            self.journal
                .borrow_mut()
                .push(format!("{entity}:{exists}:{position:?}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_entity_with_emits_per_component() {
        let mut world = World::new();
        let journal = record_everything(&mut world);

        let entity = world.create_entity_with(
            Some("ship"),
            ComponentBundle::new()
                .with("Position", Position { x: 1.0, y: 2.0 })
                .with("Health", Health(100)),
        );

        assert_eq!(
            *journal.borrow(),
            vec![
                format!("entity:created:{entity}"),
                format!("component:added:{entity}"),
                format!("component:added:{entity}"),
            ]
        );
        assert_eq!(world.get_component::<Health>(entity, "Health"), Some(&Health(100)));
        assert_eq!(world.entities_by_tag("ship"), vec![entity]);
    }

    #[test]
    fn test_created_event_carries_tag() {
        let mut world = World::new();
        let tags = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&tags);
        world.on(EventKind::EntityCreated, move |_, event| {
            if let WorldEvent::EntityCreated { tag, .. } = event {
                sink.borrow_mut().push(tag.clone());
            }
        });

        world.create_entity(Some("asteroid"));
        world.create_entity(None);
        assert_eq!(*tags.borrow(), vec![Some("asteroid".to_string()), None]);
    }

    #[test]
    fn test_add_component_rejects_unknown_entities() {
        let mut world = World::new();
        let journal = record_everything(&mut world);

        assert!(world
            .add_component(EntityId::new(404), "Position", Position { x: 0.0, y: 0.0 })
            .is_none());
        assert!(world
            .insert_component(EntityId::new(405), Velocity::default())
            .is_none());
        assert!(world.query(&["Position"]).is_empty());
        assert_eq!(world.components().stats().total_components, 0);
        assert!(journal.borrow().is_empty());
    }

    #[test]
    fn test_add_component_after_flush_is_ignored() {
        let mut world = World::new();
        let entity = world.create_entity(None);
        world.destroy_entity(entity);

        // Pending entities still accept components; the flush purges them
        assert!(world.add_component(entity, "Health", Health(1)).is_some());
        world.update(0.016);

        assert!(world.add_component(entity, "Position", Position { x: 1.0, y: 1.0 }).is_none());
        assert!(world.query(&["Position"]).is_empty());
        assert!(world.query(&["Health"]).is_empty());
    }

    #[test]
    fn test_components_attached_while_destroying_are_purged() {
        let mut world = World::new();
        let entity = world.create_entity(None);
        world.add_component(entity, "Position", Position { x: 0.0, y: 0.0 });
        world.on(EventKind::EntityDestroyed, |world, event| {
            if let Some(entity) = event.entity() {
                world.add_component(entity, "Health", Health(0));
            }
        });

        world.destroy_entity(entity);
        world.update(0.016);

        assert!(world.entity(entity).is_none());
        assert!(!world.has_component(entity, "Health"));
        assert!(world.components().get_all_from_entity(entity).is_empty());
    }

    #[test]
    fn test_destroy_entity_is_deferred() {
        let mut world = World::new();
        let journal = record_everything(&mut world);
        let entity = world.create_entity(None);
        world.add_component(entity, "Position", Position { x: 3.0, y: 4.0 });
        journal.borrow_mut().clear();

        assert!(world.destroy_entity(entity));
        assert_eq!(*journal.borrow(), vec![format!("entity:destroying:{entity}")]);
        assert!(!world.entity_exists(entity));
        assert!(world.entity(entity).is_some_and(|record| record.is_pending_removal()));
        assert_eq!(
            world.get_component::<Position>(entity, "Position"),
            Some(&Position { x: 3.0, y: 4.0 })
        );

        world.update(0.016);
        assert_eq!(journal.borrow().last(), Some(&format!("entity:destroyed:{entity}")));
        assert!(world.entity(entity).is_none());
        assert!(world.get_component::<Position>(entity, "Position").is_none());
    }

    #[test]
    fn test_destroy_unknown_entity_is_silent() {
        let mut world = World::new();
        let journal = record_everything(&mut world);
        assert!(!world.destroy_entity(EntityId::new(404)));
        assert!(journal.borrow().is_empty());
    }

    #[test]
    fn test_components_stay_readable_until_frame_end() {
        let mut world = World::new();
        let journal: Journal = Rc::new(RefCell::new(Vec::new()));
        world
            .register_system(Box::new(Reaper))
            .unwrap();
        world
            .register_system(Box::new(Observer {
                journal: Rc::clone(&journal),
            }))
            .unwrap();
        world.init();

        let doomed = world.create_entity(Some("doomed"));
        world.add_component(doomed, "Position", Position { x: 9.0, y: 9.0 });

        world.update(0.016);
        assert_eq!(
            *journal.borrow(),
            vec![format!("{doomed}:false:Some(Position {{ x: 9.0, y: 9.0 }})")]
        );
        assert!(world.entity(doomed).is_none());
        assert!(world.query(&["Position"]).is_empty());
    }

    #[test]
    fn test_entities_marked_during_flush_wait_for_next_frame() {
        let mut world = World::new();
        let first = world.create_entity(None);
        let second = world.create_entity(None);

        world.on(EventKind::EntityDestroyed, move |world, event| {
            if event.entity() == Some(first) {
                world.destroy_entity(second);
            }
        });

        world.destroy_entity(first);
        world.update(0.016);
        assert!(world.entity(first).is_none());
        assert!(world.entity(second).is_some_and(|record| record.is_pending_removal()));

        world.update(0.016);
        assert!(world.entity(second).is_none());
    }

    #[test]
    fn test_add_component_returns_value_after_listeners() {
        let mut world = World::new();
        let entity = world.create_entity(None);
        world.on(EventKind::ComponentAdded, |world, event| {
            let (Some(entity), Some(component_type)) = (event.entity(), event.component_type()) else {
                return;
            };
            if component_type.as_str() == "Health" {
                if let Some(health) = world.get_component_mut::<Health>(entity, "Health") {
                    health.0 = health.0.min(50);
                }
            } else if component_type.as_str() == "Ghost" {
                world.remove_component(entity, "Ghost");
            }
        });

        assert_eq!(world.add_component(entity, "Health", Health(80)), Some(&mut Health(50)));
        assert!(world.add_component(entity, "Ghost", ()).is_none());
        assert!(!world.has_component(entity, "Ghost"));
    }

    #[test]
    fn test_remove_component_emits_only_on_hit() {
        let mut world = World::new();
        let entity = world.create_entity(None);
        world.add_component(entity, "Health", Health(1));
        let journal = record_everything(&mut world);

        assert!(!world.remove_component(entity, "Position"));
        assert!(journal.borrow().is_empty());

        assert!(world.remove_component(entity, "Health"));
        assert_eq!(*journal.borrow(), vec![format!("component:removed:{entity}")]);
    }

    #[test]
    fn test_lifecycle_is_idempotent() {
        let mut world = World::new();
        let journal = record_everything(&mut world);
        assert_eq!(world.state(), WorldState::Uninitialized);

        world.init();
        world.init();
        assert_eq!(world.state(), WorldState::Ready);
        assert_eq!(*journal.borrow(), vec!["world:initialized"]);

        world.update(0.5);
        world.update(0.25);
        assert_eq!(world.frame_count(), 2);
        assert!((world.total_time() - 0.75).abs() < f64::EPSILON);

        world.destroy();
        assert_eq!(journal.borrow().last().map(String::as_str), Some("world:destroying"));
        world.destroy();
        assert_eq!(world.state(), WorldState::Destroyed);

        world.update(1.0);
        world.render(1.0);
        assert_eq!(world.frame_count(), 2);
        assert_eq!(world.events().stats().wildcard_listener_count, 0);
    }

    #[test]
    fn test_query_cache_revalidated_each_frame() {
        let mut world = World::new();
        let entity = world.create_entity(None);
        world.add_component(entity, "Position", Position { x: 0.0, y: 0.0 });
        assert!(!world.components().is_cache_valid());

        world.update(0.016);
        assert!(world.components().is_cache_valid());
        assert_eq!(world.query(&["Position"]), vec![entity]);
        assert_eq!(world.stats().components.cache_size, 1);
    }

    #[test]
    fn test_faulty_listener_does_not_block_world_events() {
        let mut world = World::new();
        world.on(EventKind::EntityCreated, |_, _| panic!("listener bug"));
        let journal = record_everything(&mut world);

        let entity = world.create_entity(None);
        assert!(world.entity_exists(entity));
        assert_eq!(*journal.borrow(), vec![format!("entity:created:{entity}")]);
        assert_eq!(world.stats().events.listener_failures, 1);
    }

    #[test]
    fn test_queue_and_flush_world_events() {
        let mut world = World::new();
        let journal = record_everything(&mut world);

        world.queue_event(WorldEvent::custom("wave:started", 3_u32));
        assert!(journal.borrow().is_empty());
        assert_eq!(world.flush_events(), 1);
        assert_eq!(*journal.borrow(), vec!["wave:started"]);
    }

    #[test]
    fn test_systems_see_world_through_stats() {
        let mut world = World::new();
        world
            .register_system(Box::new(Observer {
                journal: Rc::new(RefCell::new(Vec::new())),
            }))
            .unwrap();
        world.init();
        world.update(0.016);

        let stats = world.stats();
        assert_eq!(stats.state, WorldState::Ready);
        assert_eq!(stats.systems.len(), 1);
        assert_eq!(stats.systems[0].update_count, 1);
        assert!(world.system("observer").is_some());
        assert!(world.system("missing").is_none());
    }
}
