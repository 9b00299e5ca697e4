//! Tool and prompt catalogue.
//!
//! Every tool the server advertises is a member of the closed [`ToolKind`]
//! enum. Incoming tool names are resolved against it exactly once, at the
//! dispatch boundary; anything unrecognised falls into a single failure
//! path there. The advertised definitions and the enum are kept in lock
//! step by the tests in this module.

use serde::Serialize;
use serde_json::{json, Value};

/// Name of the single prompt the server advertises.
pub const PROMPT_NAME: &str = "asset_creation_strategy";

/// Description of the advertised prompt.
pub const PROMPT_DESCRIPTION: &str =
    "Defines the preferred strategy for creating assets in Blender";

/// Body of the asset creation strategy prompt.
pub const ASSET_CREATION_STRATEGY: &str = "When creating 3D content in Blender, always start by checking if integrations are available:

0. Before anything, always check the scene from get_scene_info()
1. First use the following tools to verify if the following integrations are enabled:
    1. PolyHaven
        Use get_polyhaven_status() to verify its status
        If PolyHaven is enabled:
        - For objects/models: Use download_polyhaven_asset() with asset_type=\"models\"
        - For materials/textures: Use download_polyhaven_asset() with asset_type=\"textures\"
        - For environment lighting: Use download_polyhaven_asset() with asset_type=\"hdris\"
    2. Sketchfab
        Sketchfab is good at Realistic models, and has a wider variety of models than PolyHaven.
        Use get_sketchfab_status() to verify its status
        If Sketchfab is enabled:
        - For objects/models: First search using search_sketchfab_models() with your query
        - Then download specific models using download_sketchfab_model() with the UID
    3. Hyper3D(Rodin)
        Hyper3D Rodin is good at generating 3D models for single item.
        Use get_hyper3d_status() to verify its status
        If Hyper3D is enabled:
        - Use generate_hyper3d_model_via_text() or generate_hyper3d_model_via_images()
        - Poll with poll_rodin_job_status()
        - Import with import_generated_asset()
    4. Hunyuan3D
        Hunyuan3D is good at generating 3D models for single item.
        Use get_hunyuan3d_status() to verify its status
        If Hunyuan3D is enabled:
        - Use generate_hunyuan3d_model()
        - Poll with poll_hunyuan_job_status()
        - Import with import_generated_asset_hunyuan()

2. Recommended asset source priority:
    - For specific existing objects: First try Sketchfab, then PolyHaven
    - For generic objects/furniture: First try PolyHaven, then Sketchfab
    - For custom or unique items: Use Hyper3D Rodin or Hunyuan3D
    - For environment lighting: Use PolyHaven HDRIs
    - For materials/textures: Use PolyHaven textures

3. Only fall back to scripting when:
    - All integrations are disabled
    - A simple primitive is explicitly requested
    - No suitable asset exists in any libraries";

/// The tools this server exposes, as a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Summarise the current scene.
    GetSceneInfo,
    /// Inspect a single object by name.
    GetObjectInfo,
    /// Run Python code inside Blender.
    ExecuteBlenderCode,
    /// Capture the 3D viewport as an image.
    GetViewportScreenshot,
    /// Report whether the PolyHaven integration is enabled.
    GetPolyhavenStatus,
    /// List PolyHaven categories for an asset type.
    GetPolyhavenCategories,
    /// Search PolyHaven assets.
    SearchPolyhavenAssets,
    /// Download and import a PolyHaven asset.
    DownloadPolyhavenAsset,
    /// Apply a downloaded PolyHaven texture to an object.
    SetTexture,
    /// Report whether the Sketchfab integration is enabled.
    GetSketchfabStatus,
    /// Search Sketchfab models.
    SearchSketchfabModels,
    /// Download and import a Sketchfab model.
    DownloadSketchfabModel,
    /// Report whether the Hyper3D Rodin integration is enabled.
    GetHyper3dStatus,
    /// Start a Hyper3D generation job from a text prompt.
    GenerateHyper3dModelViaText,
    /// Start a Hyper3D generation job from images.
    GenerateHyper3dModelViaImages,
    /// Poll a Hyper3D generation job.
    PollRodinJobStatus,
    /// Import a finished Hyper3D asset.
    ImportGeneratedAsset,
    /// Report whether the Hunyuan3D integration is enabled.
    GetHunyuan3dStatus,
    /// Start a Hunyuan3D generation job.
    GenerateHunyuan3dModel,
    /// Poll a Hunyuan3D generation job.
    PollHunyuanJobStatus,
    /// Import a finished Hunyuan3D asset.
    ImportGeneratedAssetHunyuan,
}

impl ToolKind {
    /// Every tool kind, in catalogue order.
    pub const ALL: [Self; 21] = [
        Self::GetSceneInfo,
        Self::GetObjectInfo,
        Self::ExecuteBlenderCode,
        Self::GetViewportScreenshot,
        Self::GetPolyhavenStatus,
        Self::GetPolyhavenCategories,
        Self::SearchPolyhavenAssets,
        Self::DownloadPolyhavenAsset,
        Self::SetTexture,
        Self::GetSketchfabStatus,
        Self::SearchSketchfabModels,
        Self::DownloadSketchfabModel,
        Self::GetHyper3dStatus,
        Self::GenerateHyper3dModelViaText,
        Self::GenerateHyper3dModelViaImages,
        Self::PollRodinJobStatus,
        Self::ImportGeneratedAsset,
        Self::GetHunyuan3dStatus,
        Self::GenerateHunyuan3dModel,
        Self::PollHunyuanJobStatus,
        Self::ImportGeneratedAssetHunyuan,
    ];

    /// Resolves a wire-format tool name to a kind.
    #[must_use]
    pub fn resolve(name: &str) -> Option<Self> {
        match name {
            "get_scene_info" => Some(Self::GetSceneInfo),
            "get_object_info" => Some(Self::GetObjectInfo),
            "execute_blender_code" => Some(Self::ExecuteBlenderCode),
            "get_viewport_screenshot" => Some(Self::GetViewportScreenshot),
            "get_polyhaven_status" => Some(Self::GetPolyhavenStatus),
            "get_polyhaven_categories" => Some(Self::GetPolyhavenCategories),
            "search_polyhaven_assets" => Some(Self::SearchPolyhavenAssets),
            "download_polyhaven_asset" => Some(Self::DownloadPolyhavenAsset),
            "set_texture" => Some(Self::SetTexture),
            "get_sketchfab_status" => Some(Self::GetSketchfabStatus),
            "search_sketchfab_models" => Some(Self::SearchSketchfabModels),
            "download_sketchfab_model" => Some(Self::DownloadSketchfabModel),
            "get_hyper3d_status" => Some(Self::GetHyper3dStatus),
            "generate_hyper3d_model_via_text" => Some(Self::GenerateHyper3dModelViaText),
            "generate_hyper3d_model_via_images" => Some(Self::GenerateHyper3dModelViaImages),
            "poll_rodin_job_status" => Some(Self::PollRodinJobStatus),
            "import_generated_asset" => Some(Self::ImportGeneratedAsset),
            "get_hunyuan3d_status" => Some(Self::GetHunyuan3dStatus),
            "generate_hunyuan3d_model" => Some(Self::GenerateHunyuan3dModel),
            "poll_hunyuan_job_status" => Some(Self::PollHunyuanJobStatus),
            "import_generated_asset_hunyuan" => Some(Self::ImportGeneratedAssetHunyuan),
            _ => None,
        }
    }

    /// Returns the wire-format name of this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetSceneInfo => "get_scene_info",
            Self::GetObjectInfo => "get_object_info",
            Self::ExecuteBlenderCode => "execute_blender_code",
            Self::GetViewportScreenshot => "get_viewport_screenshot",
            Self::GetPolyhavenStatus => "get_polyhaven_status",
            Self::GetPolyhavenCategories => "get_polyhaven_categories",
            Self::SearchPolyhavenAssets => "search_polyhaven_assets",
            Self::DownloadPolyhavenAsset => "download_polyhaven_asset",
            Self::SetTexture => "set_texture",
            Self::GetSketchfabStatus => "get_sketchfab_status",
            Self::SearchSketchfabModels => "search_sketchfab_models",
            Self::DownloadSketchfabModel => "download_sketchfab_model",
            Self::GetHyper3dStatus => "get_hyper3d_status",
            Self::GenerateHyper3dModelViaText => "generate_hyper3d_model_via_text",
            Self::GenerateHyper3dModelViaImages => "generate_hyper3d_model_via_images",
            Self::PollRodinJobStatus => "poll_rodin_job_status",
            Self::ImportGeneratedAsset => "import_generated_asset",
            Self::GetHunyuan3dStatus => "get_hunyuan3d_status",
            Self::GenerateHunyuan3dModel => "generate_hunyuan3d_model",
            Self::PollHunyuanJobStatus => "poll_hunyuan_job_status",
            Self::ImportGeneratedAssetHunyuan => "import_generated_asset_hunyuan",
        }
    }
}

/// A tool definition for the `tools/list` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Returns the definitions of all available tools.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        // Core tools
        ToolDefinition {
            name: "get_scene_info".to_string(),
            description: Some(
                "Get detailed information about the current Blender scene".to_string(),
            ),
            input_schema: json!({"type": "object", "properties": {}, "required": []}),
        },
        ToolDefinition {
            name: "get_object_info".to_string(),
            description: Some(
                "Get detailed information about a specific object in the scene".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "object_name": {"type": "string", "description": "Name of the object"}
                },
                "required": ["object_name"]
            }),
        },
        ToolDefinition {
            name: "execute_blender_code".to_string(),
            description: Some(
                "Execute Python code in Blender. Break complex operations into smaller steps."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "code": {"type": "string", "description": "Python code to execute"}
                },
                "required": ["code"]
            }),
        },
        ToolDefinition {
            name: "get_viewport_screenshot".to_string(),
            description: Some(
                "Capture a screenshot of the current Blender 3D viewport".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "max_size": {"type": "integer", "description": "Maximum size in pixels (default 800)"}
                },
                "required": []
            }),
        },
        // PolyHaven tools
        ToolDefinition {
            name: "get_polyhaven_status".to_string(),
            description: Some(
                "Check if PolyHaven integration is enabled in Blender".to_string(),
            ),
            input_schema: json!({"type": "object", "properties": {}, "required": []}),
        },
        ToolDefinition {
            name: "get_polyhaven_categories".to_string(),
            description: Some(
                "Get categories for a specific asset type on PolyHaven".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "asset_type": {"type": "string", "description": "Asset type: hdris, textures, models, all"}
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "search_polyhaven_assets".to_string(),
            description: Some(
                "Search for assets on PolyHaven with optional filtering".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "asset_type": {"type": "string", "description": "Type: hdris, textures, models, all"},
                    "categories": {"type": "string", "description": "Comma-separated categories"}
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "download_polyhaven_asset".to_string(),
            description: Some(
                "Download and import a PolyHaven asset into Blender".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "asset_id": {"type": "string", "description": "Asset ID"},
                    "asset_type": {"type": "string", "description": "Type: hdris, textures, models"},
                    "resolution": {"type": "string", "description": "Resolution: 1k, 2k, 4k"},
                    "file_format": {"type": "string", "description": "Format: hdr, exr, jpg, png, gltf, fbx"}
                },
                "required": ["asset_id", "asset_type"]
            }),
        },
        ToolDefinition {
            name: "set_texture".to_string(),
            description: Some(
                "Apply a downloaded PolyHaven texture to an object".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "object_name": {"type": "string", "description": "Object name"},
                    "texture_id": {"type": "string", "description": "PolyHaven texture ID"}
                },
                "required": ["object_name", "texture_id"]
            }),
        },
        // Sketchfab tools
        ToolDefinition {
            name: "get_sketchfab_status".to_string(),
            description: Some(
                "Check if Sketchfab integration is enabled in Blender".to_string(),
            ),
            input_schema: json!({"type": "object", "properties": {}, "required": []}),
        },
        ToolDefinition {
            name: "search_sketchfab_models".to_string(),
            description: Some("Search for models on Sketchfab".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query"},
                    "categories": {"type": "string", "description": "Comma-separated categories"},
                    "count": {"type": "integer", "description": "Max results (default 20)"},
                    "downloadable": {"type": "boolean", "description": "Only downloadable models"}
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "download_sketchfab_model".to_string(),
            description: Some("Download and import a Sketchfab model by UID".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "uid": {"type": "string", "description": "Sketchfab model UID"}
                },
                "required": ["uid"]
            }),
        },
        // Hyper3D tools
        ToolDefinition {
            name: "get_hyper3d_status".to_string(),
            description: Some(
                "Check if Hyper3D Rodin integration is enabled in Blender".to_string(),
            ),
            input_schema: json!({"type": "object", "properties": {}, "required": []}),
        },
        ToolDefinition {
            name: "generate_hyper3d_model_via_text".to_string(),
            description: Some(
                "Generate 3D asset using Hyper3D from text description".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "text_prompt": {"type": "string", "description": "Description in English"},
                    "bbox_condition": {
                        "type": "array",
                        "items": {"type": "number"},
                        "description": "[Length, Width, Height] ratio"
                    }
                },
                "required": ["text_prompt"]
            }),
        },
        ToolDefinition {
            name: "generate_hyper3d_model_via_images".to_string(),
            description: Some("Generate 3D asset using Hyper3D from images".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "input_image_paths": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Absolute paths to images"
                    },
                    "input_image_urls": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "URLs of images"
                    },
                    "bbox_condition": {
                        "type": "array",
                        "items": {"type": "number"},
                        "description": "[L,W,H] ratio"
                    }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "poll_rodin_job_status".to_string(),
            description: Some(
                "Check if Hyper3D Rodin generation task is completed".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "subscription_key": {"type": "string", "description": "For MAIN_SITE mode"},
                    "request_id": {"type": "string", "description": "For FAL_AI mode"}
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "import_generated_asset".to_string(),
            description: Some("Import asset generated by Hyper3D Rodin".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Object name in scene"},
                    "task_uuid": {"type": "string", "description": "For MAIN_SITE mode"},
                    "request_id": {"type": "string", "description": "For FAL_AI mode"}
                },
                "required": ["name"]
            }),
        },
        // Hunyuan3D tools
        ToolDefinition {
            name: "get_hunyuan3d_status".to_string(),
            description: Some(
                "Check if Hunyuan3D integration is enabled in Blender".to_string(),
            ),
            input_schema: json!({"type": "object", "properties": {}, "required": []}),
        },
        ToolDefinition {
            name: "generate_hunyuan3d_model".to_string(),
            description: Some(
                "Generate 3D asset using Hunyuan3D from text or image".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "text_prompt": {"type": "string", "description": "Text description"},
                    "input_image_url": {"type": "string", "description": "Image URL"}
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "poll_hunyuan_job_status".to_string(),
            description: Some(
                "Check if Hunyuan3D generation task is completed".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "job_id": {"type": "string", "description": "Job ID from generate step"}
                },
                "required": ["job_id"]
            }),
        },
        ToolDefinition {
            name: "import_generated_asset_hunyuan".to_string(),
            description: Some("Import asset generated by Hunyuan3D".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Object name in scene"},
                    "zip_file_url": {"type": "string", "description": "ZIP file URL from generate step"}
                },
                "required": ["name", "zip_file_url"]
            }),
        },
    ]
}
