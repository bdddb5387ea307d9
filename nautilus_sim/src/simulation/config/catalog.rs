// nautilus_sim/src/simulation/config/catalog.rs

//! The mission catalog: every `.toml` file under the missions directory,
//! keyed by its relative path with `.` separators
//! (`survey/box.toml` becomes `survey.box`).

use figment::{
    providers::{Format, Toml},
    Figment,
};
use nautilus_core::mission::{PlanDbMessage, WaypointSpec};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// One mission file. A file may carry a waypoint list for the streamed
/// sources, a plan-db message, or both.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MissionFile {
    #[serde(default)]
    pub waypoints: Vec<WaypointSpec>,
    #[serde(default)]
    pub plan: Option<PlanDbMessage>,
}

#[derive(Debug, Clone, Default)]
pub struct MissionCatalog(BTreeMap<String, MissionFile>);

impl MissionCatalog {
    /// Walks `dir` and parses every `.toml` file. Files that fail to parse
    /// are logged and skipped.
    pub fn load(dir: &Path) -> Self {
        let mut catalog = Self::default();
        if !dir.exists() {
            warn!(?dir, "mission catalog not found, no missions will be loaded");
            return catalog;
        }
        info!(?dir, "loading mission catalog");

        for entry in WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| {
                !e.file_type().is_dir() && e.path().extension().is_some_and(|ext| ext == "toml")
            })
        {
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(dir) else {
                continue;
            };
            let key = relative
                .with_extension("")
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, ".");

            match Figment::new().merge(Toml::file(path)).extract::<MissionFile>() {
                Ok(mission) => {
                    info!(%key, waypoints = mission.waypoints.len(), "loaded mission");
                    catalog.0.insert(key, mission);
                }
                Err(e) => error!(?path, error = %e, "failed to load mission"),
            }
        }
        catalog
    }

    pub fn insert(&mut self, key: impl Into<String>, mission: MissionFile) {
        self.0.insert(key.into(), mission);
    }

    pub fn get(&self, key: &str) -> Option<&MissionFile> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nautilus_core::mission::{ManeuverKind, Target, WaypointTask};
    use std::fs;

    #[test]
    fn nested_files_get_dotted_keys_and_bad_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("survey")).unwrap();
        fs::write(
            dir.path().join("survey").join("box.toml"),
            r#"
            [[waypoints]]
            id = "a"
            target = { x = 10.0, y = 0.0 }

            [[waypoints]]
            id = "b"
            target = { lat = 58.25, lon = 11.45 }
            task = { kind = "inspect", duration = 20.0 }
            "#,
        )
        .unwrap();
        fs::write(
            dir.path().join("harbour.toml"),
            r#"
            [plan]
            plan_id = "harbour"

            [[plan.maneuvers]]
            kind = "goto"
            id = "m1"
            lat = 58.25
            lon = 11.45
            "#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.toml"), "waypoints = 3").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog = MissionCatalog::load(dir.path());
        assert_eq!(catalog.keys().collect::<Vec<_>>(), vec!["harbour", "survey.box"]);

        let survey = catalog.get("survey.box").unwrap();
        assert_eq!(survey.waypoints[0].target, Target::Local { x: 10.0, y: 0.0 });
        assert_eq!(
            survey.waypoints[1].task,
            WaypointTask::Inspect { duration: 20.0 }
        );
        assert!(survey.plan.is_none());

        let plan = catalog.get("harbour").and_then(|m| m.plan.as_ref()).unwrap();
        assert_eq!(plan.maneuvers[0].kind, ManeuverKind::Goto);
    }

    #[test]
    fn missing_directory_gives_an_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = MissionCatalog::load(&dir.path().join("missing"));
        assert!(catalog.is_empty());
    }
}
