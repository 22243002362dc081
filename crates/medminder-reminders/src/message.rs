use medminder_types::models::Medication;

pub const EMAIL_SUBJECT: &str = "Medication Reminder";

pub fn email_body(med: &Medication, time: &str, day: &str) -> String {
    format!(
        "Please take your medication now.\n\n\
         Time: {time}\n\
         Day: {day}\n\
         Medication Name: {}\n\
         Dose: {}\n\
         Instructions: {}\n\n\
         Stay consistent and healthy!",
        med.name, med.dosage, med.instruction
    )
}

pub fn sms_body(med: &Medication, time: &str, day: &str) -> String {
    format!(
        "MediReminder: Time: {time}\nDay: {day}\nMedication: {}\nDose: {}",
        med.name, med.dosage
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    #[test]
    fn sms_names_time_day_and_dose() {
        let med = Medication {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Lisinopril".into(),
            dosage: "10mg".into(),
            instruction: "after breakfast".into(),
            reminder_times: vec!["08:00".into()],
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            days_of_week: vec!["Monday".into()],
            notified_today: false,
            created_at: Utc::now(),
        };
        assert_eq!(
            sms_body(&med, "08:00", "Monday"),
            "MediReminder: Time: 08:00\nDay: Monday\nMedication: Lisinopril\nDose: 10mg"
        );
        let email = email_body(&med, "08:00", "Monday");
        assert!(email.contains("Medication Name: Lisinopril"));
        assert!(email.contains("Instructions: after breakfast"));
    }
}
