/// The entity kind an event targets, resolved from the wire's version-bearing
/// kind tag (e.g. `Task6`, `Area3`). Reads tolerate every historical variant;
/// writes always use the current generation.
///
/// New kind-tag generations are added as entries in [`from_tag`], never as a
/// new branch scattered through the projection/detector code — each event's
/// tag is mapped through this table exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Area,
    Tag,
    ChecklistItem,
    Tombstone,
    /// `Settings` events are recognized but carry no projection; the driver
    /// ignores them.
    Settings,
    /// An unrecognized tag. Carries the original string so the detector can
    /// emit an `Unknown` change for forward compatibility.
    Unknown(String),
}

impl EntityKind {
    pub fn from_tag(tag: &str) -> EntityKind {
        match tag {
            "Task6" | "Task4" | "Task3" | "Task" => EntityKind::Task,
            "Area3" | "Area2" | "Area" => EntityKind::Area,
            "Tag4" | "Tag" => EntityKind::Tag,
            "ChecklistItem3" | "ChecklistItem2" | "ChecklistItem" => EntityKind::ChecklistItem,
            "Tombstone2" => EntityKind::Tombstone,
            "Settings" => EntityKind::Settings,
            other => EntityKind::Unknown(other.to_string()),
        }
    }

    /// The kind tag to use when writing a new event of this kind: always
    /// the current generation, never a legacy variant.
    pub fn current_tag(&self) -> &'static str {
        match self {
            EntityKind::Task => "Task6",
            EntityKind::Area => "Area3",
            EntityKind::Tag => "Tag4",
            EntityKind::ChecklistItem => "ChecklistItem3",
            EntityKind::Tombstone => "Tombstone2",
            EntityKind::Settings => "Settings",
            EntityKind::Unknown(_) => "Unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_task_tags_all_map_to_task() {
        for tag in ["Task6", "Task4", "Task3", "Task"] {
            assert_eq!(EntityKind::from_tag(tag), EntityKind::Task);
        }
    }

    #[test]
    fn unknown_tag_is_carried_verbatim() {
        let kind = EntityKind::from_tag("Task99");
        assert_eq!(kind, EntityKind::Unknown("Task99".to_string()));
    }

    #[test]
    fn current_tag_is_always_the_newest_generation() {
        assert_eq!(EntityKind::Task.current_tag(), "Task6");
        assert_eq!(EntityKind::Area.current_tag(), "Area3");
        assert_eq!(EntityKind::Tag.current_tag(), "Tag4");
        assert_eq!(EntityKind::ChecklistItem.current_tag(), "ChecklistItem3");
        assert_eq!(EntityKind::Tombstone.current_tag(), "Tombstone2");
    }
}
