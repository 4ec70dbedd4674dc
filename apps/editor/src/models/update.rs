use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::resume::{
    Certification, CustomSection, Education, Experience, PersonalInfo, Project, Resume, Skill,
    TemplateCustomization,
};

/// One top-level field replacement. Callers build the full new value (a whole
/// list when adding one entry); applying it never merges below the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ResumeUpdate {
    Title(String),
    TemplateName(String),
    PersonalInfo(PersonalInfo),
    Experience(Vec<Experience>),
    Education(Vec<Education>),
    Skills(Vec<Skill>),
    Certifications(Vec<Certification>),
    Projects(Vec<Project>),
    Customization(Option<TemplateCustomization>),
    SectionNames(Option<BTreeMap<String, String>>),
    CustomSections(Option<Vec<CustomSection>>),
}

impl ResumeUpdate {
    /// The document field this update replaces, as it appears on the wire.
    pub fn field(&self) -> &'static str {
        match self {
            ResumeUpdate::Title(_) => "title",
            ResumeUpdate::TemplateName(_) => "template_name",
            ResumeUpdate::PersonalInfo(_) => "personal_info",
            ResumeUpdate::Experience(_) => "experience",
            ResumeUpdate::Education(_) => "education",
            ResumeUpdate::Skills(_) => "skills",
            ResumeUpdate::Certifications(_) => "certifications",
            ResumeUpdate::Projects(_) => "projects",
            ResumeUpdate::Customization(_) => "customization",
            ResumeUpdate::SectionNames(_) => "section_names",
            ResumeUpdate::CustomSections(_) => "custom_sections",
        }
    }

    pub fn apply(self, resume: &mut Resume) {
        match self {
            ResumeUpdate::Title(v) => resume.title = v,
            ResumeUpdate::TemplateName(v) => resume.template_name = v,
            ResumeUpdate::PersonalInfo(v) => resume.personal_info = v,
            ResumeUpdate::Experience(v) => resume.experience = v,
            ResumeUpdate::Education(v) => resume.education = v,
            ResumeUpdate::Skills(v) => resume.skills = v,
            ResumeUpdate::Certifications(v) => resume.certifications = v,
            ResumeUpdate::Projects(v) => resume.projects = v,
            ResumeUpdate::Customization(v) => resume.customization = v,
            ResumeUpdate::SectionNames(v) => resume.section_names = v,
            ResumeUpdate::CustomSections(v) => resume.custom_sections = v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::SkillLevel;
    use serde_json::json;

    #[test]
    fn test_apply_replaces_only_named_field() {
        let mut resume = Resume::default();
        resume.skills.push(Skill {
            name: "Go".to_string(),
            level: None,
        });

        ResumeUpdate::Title("Staff Engineer".to_string()).apply(&mut resume);

        assert_eq!(resume.title, "Staff Engineer");
        assert_eq!(resume.skills.len(), 1);
        assert_eq!(resume.template_name, "professional-blue");
    }

    #[test]
    fn test_list_update_is_whole_replacement() {
        let mut resume = Resume::default();
        ResumeUpdate::Skills(vec![Skill {
            name: "Go".to_string(),
            level: None,
        }])
        .apply(&mut resume);
        ResumeUpdate::Skills(vec![Skill {
            name: "Rust".to_string(),
            level: Some(SkillLevel::Advanced),
        }])
        .apply(&mut resume);

        assert_eq!(resume.skills.len(), 1);
        assert_eq!(resume.skills[0].name, "Rust");
    }

    #[test]
    fn test_wire_format_is_field_value_pair() {
        let update: ResumeUpdate = serde_json::from_value(json!({
            "field": "personal_info",
            "value": { "full_name": "Grace Hopper", "email": "grace@example.com" }
        }))
        .unwrap();

        assert_eq!(update.field(), "personal_info");
        match update {
            ResumeUpdate::PersonalInfo(info) => assert_eq!(info.full_name, "Grace Hopper"),
            other => panic!("unexpected update {other:?}"),
        }
    }

    #[test]
    fn test_clearing_optional_section() {
        let mut resume = Resume::default();
        resume.section_names = Some(BTreeMap::from([(
            "experience".to_string(),
            "Work".to_string(),
        )]));
        ResumeUpdate::SectionNames(None).apply(&mut resume);
        assert!(resume.section_names.is_none());
    }
}
