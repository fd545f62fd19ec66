use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{BloodType, Gender, Lifecycle};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub tenant_key: String,
    pub mrn: String,
    pub full_name: String,
    pub full_name_ar: Option<String>,
    pub full_name_de: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<u32>,
    pub gender: Gender,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<Address>,
    pub emergency_contact: Option<EmergencyContact>,
    pub blood_type: Option<BloodType>,
    pub allergies: Vec<String>,
    pub chronic_diseases: Vec<String>,
    pub notes: Option<String>,
    pub registered_by: Option<Uuid>,
    pub last_visit: Option<DateTime<Utc>>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Patient fields accepted from callers. `mrn` and `age` are optional:
/// the MRN is generated when absent and the age derived from the birth date.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInput {
    pub mrn: Option<String>,
    pub full_name: String,
    pub full_name_ar: Option<String>,
    pub full_name_de: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<u32>,
    pub gender: Gender,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<Address>,
    pub emergency_contact: Option<EmergencyContact>,
    pub blood_type: Option<BloodType>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub chronic_diseases: Vec<String>,
    pub notes: Option<String>,
}

/// Partial update. `None` leaves the stored value untouched; the MRN cannot be changed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientUpdate {
    pub full_name: Option<String>,
    pub full_name_ar: Option<String>,
    pub full_name_de: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<Address>,
    pub emergency_contact: Option<EmergencyContact>,
    pub blood_type: Option<BloodType>,
    pub allergies: Option<Vec<String>>,
    pub chronic_diseases: Option<Vec<String>>,
    pub notes: Option<String>,
}

/// Whole years between `date_of_birth` and `today`, counting a birthday
/// only once it has been reached.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    if date_of_birth > today {
        return None;
    }
    let mut years = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

impl Patient {
    /// A new active patient. `mrn` is already normalised or generated; the
    /// age falls back to one derived from the birth date.
    pub fn register(
        tenant_key: String,
        mrn: String,
        input: PatientInput,
        registered_by: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        let age = input
            .age
            .or_else(|| input.date_of_birth.and_then(|dob| age_on(dob, now.date_naive())));
        Patient {
            id: Uuid::new_v4(),
            tenant_key,
            mrn,
            full_name: input.full_name.trim().to_string(),
            full_name_ar: input.full_name_ar,
            full_name_de: input.full_name_de,
            date_of_birth: input.date_of_birth,
            age,
            gender: input.gender,
            phone: input.phone.trim().to_string(),
            email: input.email,
            address: input.address,
            emergency_contact: input.emergency_contact,
            blood_type: input.blood_type,
            allergies: input.allergies,
            chronic_diseases: input.chronic_diseases,
            notes: input.notes,
            registered_by: Some(registered_by),
            last_visit: None,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

impl PatientUpdate {
    /// Apply onto `patient`. A new birth date without an explicit age
    /// re-derives the age.
    pub fn apply(self, patient: &mut Patient, now: DateTime<Utc>) {
        if let Some(v) = self.full_name {
            patient.full_name = v.trim().to_string();
        }
        if self.full_name_ar.is_some() {
            patient.full_name_ar = self.full_name_ar;
        }
        if self.full_name_de.is_some() {
            patient.full_name_de = self.full_name_de;
        }
        if let Some(dob) = self.date_of_birth {
            patient.date_of_birth = Some(dob);
            if self.age.is_none() {
                patient.age = age_on(dob, now.date_naive());
            }
        }
        if self.age.is_some() {
            patient.age = self.age;
        }
        if let Some(v) = self.gender {
            patient.gender = v;
        }
        if let Some(v) = self.phone {
            patient.phone = v.trim().to_string();
        }
        if self.email.is_some() {
            patient.email = self.email;
        }
        if self.address.is_some() {
            patient.address = self.address;
        }
        if self.emergency_contact.is_some() {
            patient.emergency_contact = self.emergency_contact;
        }
        if self.blood_type.is_some() {
            patient.blood_type = self.blood_type;
        }
        if let Some(v) = self.allergies {
            patient.allergies = v;
        }
        if let Some(v) = self.chronic_diseases {
            patient.chronic_diseases = v;
        }
        if self.notes.is_some() {
            patient.notes = self.notes;
        }
        patient.updated_at = now;
    }
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_completed_years() {
        assert_eq!(age_on(date(1990, 5, 20), date(2026, 5, 20)), Some(36));
        assert_eq!(age_on(date(1990, 5, 20), date(2026, 5, 19)), Some(35));
        assert_eq!(age_on(date(1990, 5, 20), date(2026, 4, 30)), Some(35));
    }

    #[test]
    fn newborn_is_zero() {
        assert_eq!(age_on(date(2026, 1, 1), date(2026, 10, 1)), Some(0));
    }

    #[test]
    fn future_birth_date_has_no_age() {
        assert_eq!(age_on(date(2030, 1, 1), date(2026, 1, 1)), None);
    }

    #[test]
    fn register_derives_missing_age() {
        let now = date(2026, 6, 1).and_hms_opt(9, 0, 0).unwrap().and_utc();
        let input = PatientInput {
            full_name: " Amira Haddad ".into(),
            phone: "+961000".into(),
            date_of_birth: Some(date(1990, 7, 1)),
            ..Default::default()
        };
        let p = Patient::register("ORG001".into(), "REF-2026-0001".into(), input, Uuid::nil(), now);
        assert_eq!(p.age, Some(35));
        assert_eq!(p.full_name, "Amira Haddad");
        assert_eq!(p.registered_by, Some(Uuid::nil()));

        let input = PatientInput {
            age: Some(40),
            date_of_birth: Some(date(1990, 7, 1)),
            ..Default::default()
        };
        let p = Patient::register("ORG001".into(), "REF-2026-0002".into(), input, Uuid::nil(), now);
        assert_eq!(p.age, Some(40));
    }

    #[test]
    fn update_rederives_age_from_new_birth_date() {
        let now = date(2026, 6, 1).and_hms_opt(9, 0, 0).unwrap().and_utc();
        let mut p = Patient::register(
            "ORG001".into(),
            "REF-2026-0001".into(),
            PatientInput {
                age: Some(30),
                ..Default::default()
            },
            Uuid::nil(),
            now,
        );
        PatientUpdate {
            date_of_birth: Some(date(2000, 1, 1)),
            phone: Some("+1 555".into()),
            ..Default::default()
        }
        .apply(&mut p, now);
        assert_eq!(p.age, Some(26));
        assert_eq!(p.phone, "+1 555");
        assert_eq!(p.mrn, "REF-2026-0001");
    }

    #[test]
    fn leap_day_birthday() {
        assert_eq!(age_on(date(2000, 2, 29), date(2026, 2, 28)), Some(25));
        assert_eq!(age_on(date(2000, 2, 29), date(2026, 3, 1)), Some(26));
    }
}
