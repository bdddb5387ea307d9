// nautilus_core/src/config.rs

//! The executor's runtime settings. Every launch parameter is a named, typed
//! field here; the simulator (or any host) resolves them once at startup and
//! hands the finished struct to `MissionExecutor::new`.

use crate::error::ConfigError;
use crate::types::GeoPoint;
use serde::{Deserialize, Serialize};

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Namespace prepended to every relative topic name.
    #[serde(default = "default_robot_name")]
    pub robot_name: String,
    /// Fixed tick rate of the behavior tree, in Hz.
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f64,
    /// Period of the liveness heartbeat, in seconds.
    #[serde(default = "default_heartbeat_period")]
    pub heartbeat_period: f64,

    #[serde(default)]
    pub topics: TopicConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub dvl: DvlConfig,
    #[serde(default)]
    pub leader: LeaderConfig,
    #[serde(default)]
    pub plan: PlanConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            robot_name: default_robot_name(),
            tick_rate_hz: default_tick_rate(),
            heartbeat_period: default_heartbeat_period(),
            topics: TopicConfig::default(),
            safety: SafetyConfig::default(),
            navigation: NavigationConfig::default(),
            dvl: DvlConfig::default(),
            leader: LeaderConfig::default(),
            plan: PlanConfig::default(),
        }
    }
}

fn default_robot_name() -> String {
    "sam".to_string()
}
fn default_tick_rate() -> f64 {
    10.0
}
fn default_heartbeat_period() -> f64 {
    1.0
}

impl ExecutorConfig {
    /// Tick period in seconds.
    pub fn tick_period(&self) -> f64 {
        1.0 / self.tick_rate_hz
    }

    /// Resolves a topic against the robot namespace. Absolute names (leading
    /// `/`) are returned unchanged.
    pub fn resolve_topic(&self, topic: &str) -> String {
        if topic.starts_with('/') {
            topic.to_string()
        } else {
            format!("/{}/{}", self.robot_name, topic)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("tick_rate_hz", self.tick_rate_hz)?;
        positive("heartbeat_period", self.heartbeat_period)?;
        self.topics.validate()?;
        self.safety.validate()?;
        self.navigation.validate()?;
        self.dvl.validate()?;
        self.leader.validate()?;
        self.plan.validate()?;
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { field, value });
    }
    if value <= 0.0 {
        return Err(ConfigError::NotPositive { field, value });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { field, value });
    }
    if value < 0.0 {
        return Err(ConfigError::NotPositive { field, value });
    }
    Ok(())
}

// =========================================================================
// == Topics ==
// =========================================================================

/// Names of every topic and action server the executor talks to. Relative
/// names are namespaced by `robot_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TopicConfig {
    // --- Inbound ---
    pub pose: String,
    pub depth: String,
    pub altitude: String,
    pub attitude: String,
    pub leak: String,
    pub dvl_feedback: String,
    pub gps_fix: String,
    pub leader_link: String,
    pub gui_wp: String,
    pub gui_wp_enable: String,
    pub live_wp: String,
    pub live_wp_enable: String,
    pub algae_follow_wp: String,
    pub algae_follow_enable: String,
    pub plandb: String,
    pub abort: String,
    pub mission_control: String,
    pub ground_heartbeat: String,

    // --- Outbound ---
    pub plan_control_state: String,
    pub estimated_state: String,
    pub heartbeat: String,
    pub last_wp: String,
    pub mission_complete: String,
    pub planned_path: String,
    pub dvl_command: String,
    pub distress: String,

    // --- Action servers ---
    pub goto_wp_action: String,
    pub leader_follower_action: String,
    pub emergency_action: String,
    pub panoramic_inspection_action: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            pose: "dr/odom".into(),
            depth: "dr/depth".into(),
            altitude: "core/dvl/altitude".into(),
            attitude: "dr/rpy".into(),
            leak: "core/leak".into(),
            dvl_feedback: "core/dvl".into(),
            gps_fix: "core/gps".into(),
            leader_link: "leader/base_link".into(),
            gui_wp: "smarc_bt/gui_wp".into(),
            gui_wp_enable: "smarc_bt/gui_wp/enable".into(),
            live_wp: "smarc_bt/live_wp".into(),
            live_wp_enable: "smarc_bt/live_wp/enable".into(),
            algae_follow_wp: "smarc_bt/algae_follow/wp".into(),
            algae_follow_enable: "smarc_bt/algae_follow/enable".into(),
            plandb: "imc/plan_db".into(),
            abort: "core/abort".into(),
            mission_control: "smarc_bt/mission_control".into(),
            ground_heartbeat: "imc/heartbeat".into(),
            plan_control_state: "smarc_bt/plan_control_state".into(),
            estimated_state: "smarc_bt/estimated_state".into(),
            heartbeat: "smarc_bt/heartbeat".into(),
            last_wp: "smarc_bt/last_wp".into(),
            mission_complete: "smarc_bt/mission_complete".into(),
            planned_path: "smarc_bt/planned_path".into(),
            dvl_command: "core/dvl/relay".into(),
            distress: "smarc_bt/distress".into(),
            goto_wp_action: "ctrl/goto_waypoint".into(),
            leader_follower_action: "ctrl/leader_follower".into(),
            emergency_action: "ctrl/emergency_surface".into(),
            panoramic_inspection_action: "ctrl/panoramic_inspection".into(),
        }
    }
}

impl TopicConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("pose", &self.pose),
            ("depth", &self.depth),
            ("altitude", &self.altitude),
            ("leak", &self.leak),
            ("leader_link", &self.leader_link),
            ("plandb", &self.plandb),
            ("heartbeat", &self.heartbeat),
            ("goto_wp_action", &self.goto_wp_action),
            ("leader_follower_action", &self.leader_follower_action),
            ("emergency_action", &self.emergency_action),
            ("panoramic_inspection_action", &self.panoramic_inspection_action),
        ];
        for (name, topic) in named {
            if topic.trim().is_empty() {
                return Err(ConfigError::EmptyTopic(name));
            }
        }
        Ok(())
    }
}

// =========================================================================
// == Safety ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SafetyConfig {
    /// Depth beyond which the vehicle is in violation, in metres.
    pub max_depth: f64,
    /// Altitude below which the grace window starts, in metres.
    pub min_altitude: f64,
    /// Altitude below which the vehicle faults immediately, in metres.
    pub absolute_min_altitude: f64,
    /// How long the altitude may stay below `min_altitude` before faulting, in seconds.
    pub min_altitude_grace: f64,
    /// Fault episodes tolerated before the executor gives up.
    pub emergency_trials_before_giving_up: u32,
    /// Failed emergency-surface goals re-issued within one episode.
    pub emergency_action_retries: u32,
    /// Age after which a sensor reading is stale, in seconds.
    pub sensor_timeout: f64,
    /// Position and depth both stale this long counts as total sensor loss.
    pub sensor_loss_timeout: f64,
    /// Silence from the ground link after which communication is lost.
    /// `None` disables the check.
    pub ground_link_timeout: Option<f64>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_depth: 20.0,
            min_altitude: 1.0,
            absolute_min_altitude: 0.5,
            min_altitude_grace: 3.0,
            emergency_trials_before_giving_up: 30,
            emergency_action_retries: 3,
            sensor_timeout: 2.0,
            sensor_loss_timeout: 10.0,
            ground_link_timeout: None,
        }
    }
}

impl SafetyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("safety.max_depth", self.max_depth)?;
        non_negative("safety.min_altitude", self.min_altitude)?;
        non_negative("safety.absolute_min_altitude", self.absolute_min_altitude)?;
        non_negative("safety.min_altitude_grace", self.min_altitude_grace)?;
        positive("safety.sensor_timeout", self.sensor_timeout)?;
        positive("safety.sensor_loss_timeout", self.sensor_loss_timeout)?;
        if let Some(timeout) = self.ground_link_timeout {
            positive("safety.ground_link_timeout", timeout)?;
        }
        if self.absolute_min_altitude > self.min_altitude {
            return Err(ConfigError::AltitudeBoundsInverted {
                absolute: self.absolute_min_altitude,
                min: self.min_altitude,
            });
        }
        Ok(())
    }
}

// =========================================================================
// == Navigation ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NavigationConfig {
    /// Position error at which a waypoint counts as reached, in metres.
    pub waypoint_tolerance: f64,
    /// Plan Dubins legs; straight lines otherwise.
    pub dubins_compute_path: bool,
    pub dubins_turning_radius: f64,
    /// Cross-track error that forces a replan, in metres.
    pub dubins_intersection_radius: f64,
    /// Sample spacing of the published path, in metres.
    pub dubins_step_size: f64,
    /// Deadline for a single leg before the goal is re-issued, in seconds.
    pub leg_timeout: f64,
    /// Re-issues of a failed or timed-out leg before the mission gives up on it.
    pub goto_retries: u32,
    /// Growth of the localization error between fixes, in metres per second.
    pub localization_error_growth: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            waypoint_tolerance: 1.5,
            dubins_compute_path: true,
            dubins_turning_radius: 5.0,
            dubins_intersection_radius: 3.0,
            dubins_step_size: 1.0,
            leg_timeout: 600.0,
            goto_retries: 3,
            localization_error_growth: 0.02,
        }
    }
}

impl NavigationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("navigation.waypoint_tolerance", self.waypoint_tolerance)?;
        positive("navigation.dubins_turning_radius", self.dubins_turning_radius)?;
        positive(
            "navigation.dubins_intersection_radius",
            self.dubins_intersection_radius,
        )?;
        positive("navigation.dubins_step_size", self.dubins_step_size)?;
        positive("navigation.leg_timeout", self.leg_timeout)?;
        non_negative(
            "navigation.localization_error_growth",
            self.localization_error_growth,
        )?;
        Ok(())
    }
}

// =========================================================================
// == DVL ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DvlConfig {
    /// Depth at which the DVL is switched on, in metres.
    pub dvl_running_depth: f64,
    /// Time spent shallow before the DVL is switched off, in seconds.
    pub dvl_cooldown: f64,
}

impl Default for DvlConfig {
    fn default() -> Self {
        Self {
            dvl_running_depth: 0.55,
            dvl_cooldown: 5.0,
        }
    }
}

impl DvlConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("dvl.dvl_running_depth", self.dvl_running_depth)?;
        non_negative("dvl.dvl_cooldown", self.dvl_cooldown)?;
        Ok(())
    }
}

// =========================================================================
// == Leader-Follower ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LeaderConfig {
    pub enable_leader_follower: bool,
    /// Frame of the leader vehicle used for the pose lookup.
    pub leader_link: String,
    /// Standoff below which the follower holds station, in metres.
    pub min_distance_to_leader: f64,
    /// Age after which the leader pose is stale, in seconds.
    pub leader_pose_timeout: f64,
    /// Leader displacement that triggers a refreshed follow goal, in metres.
    pub follow_refresh_distance: f64,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            enable_leader_follower: false,
            leader_link: "leader/base_link".into(),
            min_distance_to_leader: 5.0,
            leader_pose_timeout: 5.0,
            follow_refresh_distance: 2.0,
        }
    }
}

impl LeaderConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("leader.min_distance_to_leader", self.min_distance_to_leader)?;
        positive("leader.leader_pose_timeout", self.leader_pose_timeout)?;
        positive("leader.follow_refresh_distance", self.follow_refresh_distance)?;
        Ok(())
    }
}

// =========================================================================
// == Mission Plan ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PlanConfig {
    /// Start executing a plan as soon as it is received.
    pub auto_start: bool,
    /// Goal tolerance assigned to plan-db maneuvers, in metres.
    pub default_goal_tolerance: f64,
    /// Origin of the local frame. Latched from the first GPS fix when unset.
    pub geo_origin: Option<GeoPoint>,
    /// Sensor swath used to space CoverArea lanes, in metres.
    pub coverage_swath: Option<f64>,
    /// Expected survey speed, used to turn distance into elapsed time when
    /// estimating drift over a coverage pattern, in m/s.
    pub nominal_speed: f64,
    /// Tolerances used to decide two streamed waypoints are the same.
    pub similar_z_tolerance: f64,
    pub similar_rpm_tolerance: f64,
    pub similar_speed_tolerance: f64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            default_goal_tolerance: 2.0,
            geo_origin: None,
            coverage_swath: Some(10.0),
            nominal_speed: 1.0,
            similar_z_tolerance: 0.6,
            similar_rpm_tolerance: 50.0,
            similar_speed_tolerance: 0.1,
        }
    }
}

impl PlanConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("plan.default_goal_tolerance", self.default_goal_tolerance)?;
        positive("plan.nominal_speed", self.nominal_speed)?;
        if let Some(swath) = self.coverage_swath {
            positive("plan.coverage_swath", swath)?;
        }
        if let Some(origin) = self.geo_origin {
            if !origin.is_finite() || origin.lat.abs() > 90.0 {
                return Err(ConfigError::BadOrigin(origin.lat));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ExecutorConfig::default().validate(), Ok(()));
    }

    #[test]
    fn inverted_altitude_bounds_are_rejected() {
        let mut config = ExecutorConfig::default();
        config.safety.absolute_min_altitude = 2.0;
        config.safety.min_altitude = 1.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::AltitudeBoundsInverted {
                absolute: 2.0,
                min: 1.0
            })
        );
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        let config = ExecutorConfig {
            tick_rate_hz: 0.0,
            ..ExecutorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive {
                field: "tick_rate_hz",
                ..
            })
        ));
    }

    #[test]
    fn relative_topics_are_namespaced() {
        let config = ExecutorConfig::default();
        assert_eq!(config.resolve_topic("core/leak"), "/sam/core/leak");
        assert_eq!(config.resolve_topic("/global/abort"), "/global/abort");
    }
}
