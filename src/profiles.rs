//! Brew profile catalog.
//!
//! Profiles are loaded once at boot from the JSON document embedded in the
//! firmware image and are immutable afterwards.  Storage is fixed-capacity
//! (`heapless`) so the catalog's footprint is known at link time.

use heapless::{String, Vec};
use log::{info, warn};
use serde::Deserialize;

use crate::error::ProfileError;

pub const MAX_PROFILES: usize = 16;
pub const MAX_PHASES: usize = 6;
pub const MAX_NAME: usize = 32;

pub type Name = String<MAX_NAME>;

static BUILTIN_JSON: &str = include_str!("profiles.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitType {
    #[default]
    None,
    FlowUnder,
    FlowOver,
    PressureUnder,
    PressureOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    #[default]
    Fast,
    Smooth,
    /// Treated as [`Transition::Fast`] by the interpreter.
    Hold,
}

/// Primary control variable of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhasePump {
    #[default]
    Pressure,
    Flow,
}

/// One control segment.  Absent numeric fields are 0, which disables the
/// corresponding threshold or ceiling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BrewPhase {
    pub name: Name,
    #[serde(default)]
    pub pressure: f32,
    #[serde(default)]
    pub flow: f32,
    #[serde(default)]
    pub volume: f32,
    #[serde(default)]
    pub weight: f32,
    #[serde(default)]
    pub exit_flow_under: f32,
    #[serde(default)]
    pub exit_flow_over: f32,
    #[serde(default)]
    pub exit_pressure_over: f32,
    #[serde(default)]
    pub exit_pressure_under: f32,
    #[serde(default)]
    pub max_secondary: f32,
    #[serde(default)]
    pub max_secondary_range: f32,
    #[serde(default)]
    pub seconds: f32,
    #[serde(default)]
    pub exit_type: ExitType,
    #[serde(default)]
    pub transition: Transition,
    #[serde(default)]
    pub pump: PhasePump,
}

impl BrewPhase {
    /// Hold has no behaviour of its own; it runs like a fast phase.
    pub fn is_smooth(&self) -> bool {
        self.transition == Transition::Smooth
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrewProfile {
    pub name: Name,
    pub shortname: Name,
    pub temperature: f32,
    pub scales: bool,
    pub flow: bool,
    pub phases: Vec<BrewPhase, MAX_PHASES>,
}

/// Wire shape before capacity checks.
#[derive(Deserialize)]
struct RawProfile {
    name: std::string::String,
    #[serde(default)]
    shortname: std::string::String,
    #[serde(default)]
    temperature: f32,
    #[serde(default)]
    scales: bool,
    #[serde(default)]
    flow: bool,
    #[serde(default)]
    phases: std::vec::Vec<BrewPhase>,
}

fn bounded(s: &str) -> Result<Name, ProfileError> {
    Name::try_from(s).map_err(|_| ProfileError::NameTooLong)
}

impl TryFrom<RawProfile> for BrewProfile {
    type Error = ProfileError;

    fn try_from(raw: RawProfile) -> Result<Self, ProfileError> {
        let name = bounded(&raw.name)?;
        let shortname = bounded(&raw.shortname)?;
        if raw.phases.len() > MAX_PHASES {
            warn!(
                "profiles: '{}' has {} phases, keeping the first {}",
                raw.name,
                raw.phases.len(),
                MAX_PHASES
            );
        }
        let phases = raw.phases.into_iter().take(MAX_PHASES).collect();
        Ok(Self {
            name,
            shortname,
            temperature: raw.temperature,
            scales: raw.scales,
            flow: raw.flow,
            phases,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileCatalog {
    profiles: Vec<BrewProfile, MAX_PROFILES>,
}

impl ProfileCatalog {
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let raw: std::vec::Vec<RawProfile> =
            serde_json::from_str(json).map_err(|_| ProfileError::Malformed)?;
        if raw.is_empty() {
            return Err(ProfileError::Empty);
        }
        if raw.len() > MAX_PROFILES {
            return Err(ProfileError::TooManyProfiles);
        }

        let mut profiles = Vec::new();
        for r in raw {
            let profile = BrewProfile::try_from(r)?;
            profiles
                .push(profile)
                .map_err(|_| ProfileError::TooManyProfiles)?;
        }
        Ok(Self { profiles })
    }

    /// The catalog compiled into the firmware.
    pub fn builtin() -> Result<Self, ProfileError> {
        let catalog = Self::from_json(BUILTIN_JSON)?;
        info!("profiles: {} built-in profiles loaded", catalog.len());
        Ok(catalog)
    }

    pub fn get(&self, index: usize) -> Option<&BrewProfile> {
        self.profiles.get(index)
    }

    /// Index of the profile with this short name.
    pub fn find(&self, shortname: &str) -> Option<usize> {
        self.profiles
            .iter()
            .position(|p| p.shortname.as_str() == shortname)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BrewProfile> {
        self.profiles.iter()
    }
}
