use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! wire_enum {
    ($name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn from_i64(raw: i64) -> Option<$name> {
                match raw {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn as_i64(self) -> i64 {
                self as i64
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = i64::deserialize(deserializer)?;
                $name::from_i64(raw).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        concat!(stringify!($name), " integer out of range: {}"),
                        raw
                    ))
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_i64(self.as_i64())
            }
        }
    };
}

// Task type integer: 0=task, 1=project, 2=heading.
wire_enum!(TaskType {
    Task = 0,
    Project = 1,
    Heading = 2,
});

// Status integer: 0=pending, 2=canceled, 3=completed. There is
// deliberately no `1` — that gap is the wire format's, not a typo here.
wire_enum!(Status {
    Pending = 0,
    Canceled = 2,
    Completed = 3,
});

// Schedule integer: 0=inbox, 1=anytime, 2=someday.
wire_enum!(Schedule {
    Inbox = 0,
    Anytime = 1,
    Someday = 2,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_roundtrips_through_json() {
        for (raw, expected) in [(0, TaskType::Task), (1, TaskType::Project), (2, TaskType::Heading)] {
            let parsed: TaskType = serde_json::from_str(&raw.to_string()).unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(serde_json::to_string(&parsed).unwrap(), raw.to_string());
        }
    }

    #[test]
    fn status_has_a_gap_at_one() {
        assert!(Status::from_i64(1).is_none());
        assert_eq!(Status::from_i64(0), Some(Status::Pending));
        assert_eq!(Status::from_i64(2), Some(Status::Canceled));
        assert_eq!(Status::from_i64(3), Some(Status::Completed));
    }

    #[test]
    fn out_of_range_integer_fails_to_parse() {
        let result: Result<Schedule, _> = serde_json::from_str("99");
        assert!(result.is_err());
    }
}
