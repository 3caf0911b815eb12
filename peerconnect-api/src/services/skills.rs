use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use peerconnect_shared::{AppError, AppResult, ErrorCode};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{NewUserSkill, Skill, SkillType, UserSkill};
use crate::repository::SkillRepository;

#[derive(Debug, Clone, Serialize)]
pub struct SkillCategory {
    pub category: String,
    pub skills: Vec<Skill>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeldSkill {
    pub skill_id: Uuid,
    pub name: String,
    pub category: String,
    pub proficiency_level: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SkillSet {
    pub teaching: Vec<HeldSkill>,
    pub learning: Vec<HeldSkill>,
}

pub struct SkillSetService {
    skills: Arc<dyn SkillRepository>,
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

impl SkillSetService {
    pub fn new(skills: Arc<dyn SkillRepository>) -> Self {
        Self { skills }
    }

    /// The catalog grouped by category, categories in name order.
    pub fn catalog(&self, search: Option<&str>) -> AppResult<Vec<SkillCategory>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let mut grouped: BTreeMap<String, Vec<Skill>> = BTreeMap::new();
        for skill in self.skills.list_skills(search)? {
            grouped.entry(skill.category.clone()).or_default().push(skill);
        }
        Ok(grouped
            .into_iter()
            .map(|(category, skills)| SkillCategory { category, skills })
            .collect())
    }

    pub fn skill_set(&self, user_id: Uuid) -> AppResult<SkillSet> {
        let rows = self.skills.user_skills(user_id)?;
        self.describe(rows)
    }

    fn describe(&self, rows: Vec<UserSkill>) -> AppResult<SkillSet> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.skill_id).collect();
        let catalog: HashMap<Uuid, Skill> = self
            .skills
            .find_skills(&ids)?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let mut set = SkillSet::default();
        for row in rows {
            let Some(skill) = catalog.get(&row.skill_id) else {
                continue;
            };
            let held = HeldSkill {
                skill_id: row.skill_id,
                name: skill.name.clone(),
                category: skill.category.clone(),
                proficiency_level: row.proficiency_level,
            };
            match row.skill_type {
                SkillType::Teaching => set.teaching.push(held),
                SkillType::Learning => set.learning.push(held),
            }
        }
        Ok(set)
    }

    fn ensure_exist(&self, ids: &[Uuid]) -> AppResult<()> {
        let found: HashSet<Uuid> = self.skills.find_skills(ids)?.into_iter().map(|s| s.id).collect();
        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !found.contains(id))
            .map(|id| id.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::with_details(
                ErrorCode::SkillNotFound,
                "unknown skill",
                serde_json::json!({ "skill_ids": missing }),
            ))
        }
    }

    /// Replaces the whole skill set. A skill may appear on one side only.
    pub fn replace(&self, user_id: Uuid, teaching: &[Uuid], learning: &[Uuid]) -> AppResult<SkillSet> {
        let teaching = dedup(teaching);
        let learning = dedup(learning);

        let conflicts: Vec<String> = teaching
            .iter()
            .filter(|id| learning.contains(id))
            .map(|id| id.to_string())
            .collect();
        if !conflicts.is_empty() {
            return Err(AppError::with_details(
                ErrorCode::ConflictingSkillTypes,
                "a skill cannot be both teaching and learning",
                serde_json::json!({ "skill_ids": conflicts }),
            ));
        }

        let all: Vec<Uuid> = teaching.iter().chain(learning.iter()).copied().collect();
        self.ensure_exist(&all)?;

        let rows: Vec<NewUserSkill> = teaching
            .iter()
            .map(|id| NewUserSkill::new(user_id, *id, SkillType::Teaching))
            .chain(learning.iter().map(|id| NewUserSkill::new(user_id, *id, SkillType::Learning)))
            .collect();

        let saved = self.skills.replace_user_skills(user_id, &rows)?;
        tracing::info!(
            user_id = %user_id,
            teaching = teaching.len(),
            learning = learning.len(),
            "skill set replaced"
        );
        self.describe(saved)
    }

    /// Tags one skill, moving it to `skill_type` if it was on the other side.
    pub fn set_skill(&self, user_id: Uuid, skill_id: Uuid, skill_type: SkillType) -> AppResult<UserSkill> {
        self.ensure_exist(&[skill_id])?;
        self.skills
            .set_user_skill(&NewUserSkill::new(user_id, skill_id, skill_type))
    }

    pub fn remove_skill(&self, user_id: Uuid, skill_id: Uuid) -> AppResult<()> {
        if self.skills.remove_user_skill(user_id, skill_id)? {
            Ok(())
        } else {
            Err(AppError::not_found("skill is not in your skill set"))
        }
    }
}
