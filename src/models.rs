use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct StudentRecord {
    #[serde(default)]
    pub record_id: Value,
    #[serde(default)]
    pub student_name: Value,
    #[serde(default)]
    pub bu_id: Value,
    #[serde(default)]
    pub program_of_study: Value,
    #[serde(default)]
    pub semester: Value,
    pub courses: Vec<Course>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Course {
    #[serde(default)]
    pub course_id: Value,
    #[serde(default)]
    pub course_name: Value,
    #[serde(default)]
    pub course_section: Value,
    #[serde(default)]
    pub start_time: Value,
    #[serde(default)]
    pub duration: Value,
    #[serde(default)]
    pub building_code: Value,
    #[serde(default)]
    pub room_number: Value,
    #[serde(default)]
    pub course_credits: Value,
}

impl Course {
    /// Cell values in report column order.
    pub fn columns(&self) -> [&Value; 8] {
        [
            &self.course_id,
            &self.course_name,
            &self.course_section,
            &self.start_time,
            &self.duration,
            &self.building_code,
            &self.room_number,
            &self.course_credits,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub name: String,
    pub timestamp: String,
}

/// Renders an opaque scalar the way it is interpolated into header text.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn parse_batch(contents: &str) -> serde_json::Result<Vec<StudentRecord>> {
    serde_json::from_str(contents)
}
