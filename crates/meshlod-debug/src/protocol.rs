//! Debug protocol - JSON command/response definitions

use serde::{Deserialize, Serialize};

/// Commands accepted by the debug server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params")]
pub enum DebugCommand {
    /// Ping (health check)
    Ping,
    /// Current tunables and the bucket sizes of the latest frame
    GetLodState,
    /// Change LOD tunables (only specified fields are updated, values are clamped)
    SetLodParams {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance_count: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lod_pow: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enable_culling: Option<bool>,
    },
    /// Place or orient the camera whose frustum drives culling
    SetPreviewCamera {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zenith: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        azimuth: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<[f32; 3]>,
    },
    /// Start or stop the preview camera's zenith/azimuth animation
    SetSweep {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zenith: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        azimuth: Option<bool>,
    },
    /// Drive the preview camera with the fly controls instead of the view camera
    Possess { enabled: bool },
    /// Get GPU profiling statistics (per-stage timing)
    GetProfileStats,
    /// Get FPS statistics
    GetFpsStats,
}

/// Responses from debug server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum DebugResponse {
    #[serde(rename = "ok")]
    Ok { data: ResponseData },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Response data variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    Pong { message: String },
    LodState(LodStateInfo),
    ParamsUpdated { description: String },
    ProfileStats {
        enabled: bool,
        calculate_ms: f32,
        prepare_ms: f32,
        draw_ms: f32,
        total_gpu_ms: f32,
    },
    FpsStats {
        current_fps: f32,
        avg_frame_ms: f32,
        frame_count: u64,
        elapsed_secs: f32,
    },
    None,
}

/// Snapshot of the LOD tunables and the last classified frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LodStateInfo {
    pub instance_count: u32,
    pub instance_count_max: u32,
    pub lod_count: u32,
    pub lod_pow: f32,
    pub enable_culling: bool,
    pub possessed: bool,
    pub sweep_zenith: bool,
    pub sweep_azimuth: bool,
    /// Instances per LOD level
    pub level_counts: Vec<u32>,
    pub visible: u32,
    pub culled: u32,
    pub preview_camera: PreviewCameraInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewCameraInfo {
    pub position: [f32; 3],
    pub zenith: f32,
    pub azimuth: f32,
    pub far: f32,
}

impl DebugResponse {
    pub fn ok(data: ResponseData) -> Self {
        Self::Ok { data }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error {
            message: msg.into(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(ResponseData::Pong {
            message: "pong".into(),
        })
    }

    pub fn none() -> Self {
        Self::ok(ResponseData::None)
    }

    pub fn updated(description: impl Into<String>) -> Self {
        Self::ok(ResponseData::ParamsUpdated {
            description: description.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_lod_params() {
        let cmd: DebugCommand =
            serde_json::from_str(r#"{"cmd":"SetLodParams","params":{"lod_pow":0.5}}"#).unwrap();
        assert_eq!(
            cmd,
            DebugCommand::SetLodParams {
                instance_count: None,
                lod_pow: Some(0.5),
                enable_culling: None,
            }
        );
    }

    #[test]
    fn test_unit_command() {
        let cmd: DebugCommand = serde_json::from_str(r#"{"cmd":"GetLodState"}"#).unwrap();
        assert_eq!(cmd, DebugCommand::GetLodState);
    }

    #[test]
    fn test_preview_camera_position() {
        let cmd: DebugCommand = serde_json::from_str(
            r#"{"cmd":"SetPreviewCamera","params":{"position":[1.0,2.0,3.0]}}"#,
        )
        .unwrap();
        match cmd {
            DebugCommand::SetPreviewCamera { position, zenith, .. } => {
                assert_eq!(position, Some([1.0, 2.0, 3.0]));
                assert_eq!(zenith, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_error_response_shape() {
        let json = serde_json::to_value(DebugResponse::error("bad")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "bad");
    }

    #[test]
    fn test_lod_state_round_trip() {
        let state = LodStateInfo {
            instance_count: 50,
            instance_count_max: 40_000,
            lod_count: 5,
            lod_pow: 0.7,
            enable_culling: true,
            level_counts: vec![10, 5, 0, 0, 0],
            visible: 15,
            culled: 35,
            ..Default::default()
        };
        let json = serde_json::to_string(&DebugResponse::ok(ResponseData::LodState(state.clone()))).unwrap();
        let back: DebugResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DebugResponse::ok(ResponseData::LodState(state)));
    }
}
