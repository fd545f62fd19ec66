use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form is used both as the database value and the JSON value.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Role {
    SuperAdmin => "superadmin",
    Admin => "admin",
    Doctor => "doctor",
    Nurse => "nurse",
    Receptionist => "receptionist",
    Lab => "lab",
});

str_enum!(Lifecycle {
    Active => "active",
    Inactive => "inactive",
    Deleted => "deleted",
});

str_enum!(SubscriptionPlan {
    Trial => "trial",
    Basic => "basic",
    Premium => "premium",
    Enterprise => "enterprise",
});

str_enum!(Locale {
    En => "en",
    Ar => "ar",
    De => "de",
});

str_enum!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
});

str_enum!(BloodType {
    APositive => "A+",
    ANegative => "A-",
    BPositive => "B+",
    BNegative => "B-",
    AbPositive => "AB+",
    AbNegative => "AB-",
    OPositive => "O+",
    ONegative => "O-",
    Unknown => "Unknown",
});

str_enum!(OrderStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(ExecutionAction {
    Started => "started",
    Paused => "paused",
    Resumed => "resumed",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(OrderKind {
    Nursing => "nursing",
    Lab => "lab",
});

str_enum!(Priority {
    Routine => "routine",
    Urgent => "urgent",
    Stat => "stat",
});

str_enum!(NursingActionType {
    Injection => "injection",
    Dressing => "dressing",
    IvDrip => "iv_drip",
    Medication => "medication",
    VitalSigns => "vital_signs",
    BloodDraw => "blood_draw",
    Other => "other",
});

str_enum!(AdministrationMethod {
    Iv => "IV",
    Im => "IM",
    Sc => "SC",
    Po => "PO",
    Topical => "topical",
    Other => "other",
});

str_enum!(LabCategory {
    Hematology => "hematology",
    Biochemistry => "biochemistry",
    Microbiology => "microbiology",
    Immunology => "immunology",
    Radiology => "radiology",
    Other => "other",
});

str_enum!(AuditStatus {
    Success => "success",
    Failure => "failure",
    Error => "error",
});

str_enum!(ResourceType {
    Patient => "patient",
    MedicalRecord => "medical_record",
    NursingOrder => "nursing_order",
    LabTest => "lab_test",
    User => "user",
    Organization => "organization",
    System => "system",
});

str_enum!(Feature {
    Analytics => "analytics",
    LabModule => "lab_module",
    NursingModule => "nursing_module",
    BillingModule => "billing_module",
    CloudStorage => "cloud_storage",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_str() {
        for role in [
            Role::SuperAdmin,
            Role::Admin,
            Role::Doctor,
            Role::Nurse,
            Role::Receptionist,
            Role::Lab,
        ] {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = Role::from_str("janitor").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&OrderStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let parsed: BloodType = serde_json::from_str("\"AB-\"").unwrap();
        assert_eq!(parsed, BloodType::AbNegative);
    }
}
