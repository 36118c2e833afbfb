//! Request validation for patients, appointments, consultations and sign-in.
//!
//! Validators collect every failing field instead of stopping at the first
//! one, so clients can flag all of them at once.

use std::collections::BTreeMap;

use crate::masks::digits_only;
use crate::scheduling::parse_time_of_day;

pub const MIN_APPOINTMENT_DURATION: i32 = 15;
pub const MIN_LOGIN_PASSWORD_LEN: usize = 6;
pub const MIN_REGISTER_PASSWORD_LEN: usize = 8;
pub const MIN_NAME_LEN: usize = 2;
const CPF_DIGITS: usize = 11;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    fn require(&mut self, field: &str, value: &str, message: &str) {
        if value.trim().is_empty() {
            self.add(field, message);
        }
    }

    fn email(&mut self, field: &str, value: Option<&str>) {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            if !v.contains('@') {
                self.add(field, "invalid email");
            }
        }
    }

    fn phone(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "phone is required");
            return;
        }
        let n = digits_only(value).len();
        if n != 10 && n != 11 {
            self.add(field, "phone must have 10 or 11 digits");
        }
    }

    fn time(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "time is required");
        } else if let Err(e) = parse_time_of_day(value) {
            self.add(field, e.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PatientForm<'a> {
    pub full_name: &'a str,
    pub phone: &'a str,
    pub email: Option<&'a str>,
    pub cpf: Option<&'a str>,
}

pub fn validate_patient(form: &PatientForm<'_>) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    errors.require("full_name", form.full_name, "full name is required");
    errors.phone("phone", form.phone);
    errors.email("email", form.email);

    if let Some(cpf) = form.cpf.filter(|c| !c.trim().is_empty()) {
        if digits_only(cpf).len() != CPF_DIGITS {
            errors.add("cpf", "CPF must have 11 digits");
        }
    }
    errors.into_result()
}

#[derive(Debug, Clone, Copy)]
pub struct AppointmentForm<'a> {
    pub patient_name: &'a str,
    pub patient_phone: &'a str,
    pub patient_email: Option<&'a str>,
    pub appointment_time: &'a str,
    pub duration: i32,
    pub service: &'a str,
    pub dentist: &'a str,
}

pub fn validate_appointment(form: &AppointmentForm<'_>) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    errors.require("patient_name", form.patient_name, "patient name is required");
    errors.phone("patient_phone", form.patient_phone);
    errors.email("patient_email", form.patient_email);
    errors.time("appointment_time", form.appointment_time);
    errors.require("service", form.service, "service is required");
    errors.require("dentist", form.dentist, "dentist is required");
    if form.duration < MIN_APPOINTMENT_DURATION {
        errors.add(
            "duration",
            format!("minimum duration is {MIN_APPOINTMENT_DURATION} minutes"),
        );
    }
    errors.into_result()
}

#[derive(Debug, Clone, Copy)]
pub struct ConsultationForm<'a> {
    pub patient_name: &'a str,
    pub consultation_time: &'a str,
    pub dentist: &'a str,
    pub specialty: &'a str,
    pub chief_complaint: &'a str,
    pub diagnosis: &'a str,
    pub treatment: &'a str,
}

pub fn validate_consultation(form: &ConsultationForm<'_>) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    errors.require("patient_name", form.patient_name, "patient name is required");
    errors.time("consultation_time", form.consultation_time);
    errors.require("dentist", form.dentist, "dentist is required");
    errors.require("specialty", form.specialty, "specialty is required");
    errors.require("chief_complaint", form.chief_complaint, "chief complaint is required");
    errors.require("diagnosis", form.diagnosis, "diagnosis is required");
    errors.require("treatment", form.treatment, "treatment is required");
    errors.into_result()
}

pub fn validate_sign_in(email: &str, password: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if !email.contains('@') {
        errors.add("email", "invalid email");
    }
    if password.chars().count() < MIN_LOGIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("password must have at least {MIN_LOGIN_PASSWORD_LEN} characters"),
        );
    }
    errors.into_result()
}

pub fn validate_sign_up(
    full_name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if full_name.trim().chars().count() < MIN_NAME_LEN {
        errors.add(
            "full_name",
            format!("name must have at least {MIN_NAME_LEN} characters"),
        );
    }
    if !email.contains('@') {
        errors.add("email", "invalid email");
    }
    if password.chars().count() < MIN_REGISTER_PASSWORD_LEN {
        errors.add(
            "password",
            format!("password must have at least {MIN_REGISTER_PASSWORD_LEN} characters"),
        );
    }
    if password != confirm_password {
        errors.add("confirm_password", "passwords do not match");
    }
    errors.into_result()
}

/// Trims symptoms, drops blanks and keeps the first occurrence of each.
pub fn normalize_symptoms(symptoms: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(symptoms.len());
    for s in symptoms {
        let s = s.trim();
        if !s.is_empty() && !out.iter().any(|seen| seen == s) {
            out.push(s.to_string());
        }
    }
    out
}

/// Trimmed value, or `None` when blank.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
