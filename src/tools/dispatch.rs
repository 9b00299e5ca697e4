//! Tool dispatch against the Blender gateway.
//!
//! The dispatcher translates a tool call into one command for the Blender
//! addon and renders the reply as text for the assistant. Failures of any
//! kind (unknown tool, bad arguments, gateway errors) come back as a
//! normal string with an `Error: ` marker; the protocol layer never turns
//! a tool failure into a JSON-RPC error.

use std::path::PathBuf;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::blender::{BlenderConnection, GatewayError};
use crate::telemetry::Telemetry;
use crate::tools::registry::ToolKind;

/// Largest number of search hits rendered in a listing.
const MAX_LISTED_RESULTS: usize = 20;

/// Reasons a tool call failed before or at the gateway.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The requested tool is not in the catalogue.
    #[error("Unknown tool: {name}")]
    UnknownTool {
        /// The name the client asked for.
        name: String,
    },

    /// The gateway reported a failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A bounding box component was zero or negative.
    #[error("bbox must be > 0")]
    BboxNotPositive,

    /// The bounding box was not an array of numbers.
    #[error("bbox_condition must be an array of numbers")]
    BboxNotNumeric,

    /// An image path entry was not a string.
    #[error("input_image_paths entries must be strings")]
    ImagePathNotAString,

    /// A local image file could not be read.
    #[error("Could not read image file: {path}")]
    ImageRead {
        /// The path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Routes tool calls to the Blender gateway and formats the results.
pub struct ToolDispatcher {
    connection: BlenderConnection,
    telemetry: Telemetry,
}

impl ToolDispatcher {
    /// Creates a dispatcher over the given gateway.
    #[must_use]
    pub const fn new(connection: BlenderConnection, telemetry: Telemetry) -> Self {
        Self {
            connection,
            telemetry,
        }
    }

    /// Closes the gateway connection if one is open.
    pub fn shutdown(&mut self) {
        self.connection.disconnect();
    }

    /// Executes a tool call and renders the outcome as text.
    ///
    /// Never fails: any error is rendered into the returned string with
    /// an `Error: ` prefix.
    pub async fn dispatch(&mut self, name: &str, arguments: &Value) -> String {
        let started = Instant::now();

        let outcome = match ToolKind::resolve(name) {
            Some(kind) => self.invoke(kind, arguments).await,
            None => Err(DispatchError::UnknownTool {
                name: name.to_string(),
            }),
        };

        self.telemetry.record_tool_call(
            name,
            outcome.is_ok(),
            started.elapsed(),
            outcome.as_ref().err().map(ToString::to_string),
        );

        match outcome {
            Ok(text) => text,
            Err(e) => {
                warn!(tool = name, error = %e, "tool call failed");
                format!("Error: {e}")
            }
        }
    }

    async fn invoke(&mut self, kind: ToolKind, args: &Value) -> Result<String, DispatchError> {
        match kind {
            ToolKind::GetSceneInfo => self.get_scene_info().await,
            ToolKind::GetObjectInfo => self.get_object_info(args).await,
            ToolKind::ExecuteBlenderCode => self.execute_blender_code(args).await,
            ToolKind::GetViewportScreenshot => self.get_viewport_screenshot(args).await,
            ToolKind::GetPolyhavenStatus => {
                self.integration_status("get_polyhaven_status", "PolyHaven status unknown")
                    .await
            }
            ToolKind::GetPolyhavenCategories => self.get_polyhaven_categories(args).await,
            ToolKind::SearchPolyhavenAssets => self.search_polyhaven_assets(args).await,
            ToolKind::DownloadPolyhavenAsset => self.download_polyhaven_asset(args).await,
            ToolKind::SetTexture => self.set_texture(args).await,
            ToolKind::GetSketchfabStatus => {
                self.integration_status("get_sketchfab_status", "Sketchfab status unknown")
                    .await
            }
            ToolKind::SearchSketchfabModels => self.search_sketchfab_models(args).await,
            ToolKind::DownloadSketchfabModel => self.download_sketchfab_model(args).await,
            ToolKind::GetHyper3dStatus => {
                self.integration_status("get_hyper3d_status", "Hyper3D status unknown")
                    .await
            }
            ToolKind::GenerateHyper3dModelViaText => {
                self.generate_hyper3d_model_via_text(args).await
            }
            ToolKind::GenerateHyper3dModelViaImages => {
                self.generate_hyper3d_model_via_images(args).await
            }
            ToolKind::PollRodinJobStatus => self.poll_rodin_job_status(args).await,
            ToolKind::ImportGeneratedAsset => self.import_generated_asset(args).await,
            ToolKind::GetHunyuan3dStatus => {
                self.integration_status("get_hunyuan3d_status", "Hunyuan3D status unknown")
                    .await
            }
            ToolKind::GenerateHunyuan3dModel => self.generate_hunyuan3d_model(args).await,
            ToolKind::PollHunyuanJobStatus => self.poll_hunyuan_job_status(args).await,
            ToolKind::ImportGeneratedAssetHunyuan => {
                self.import_generated_asset_hunyuan(args).await
            }
        }
    }

    // Core tools

    async fn get_scene_info(&mut self) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command("get_scene_info", json!({}))
            .await?;
        Ok(pretty(&result))
    }

    async fn get_object_info(&mut self, args: &Value) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command(
                "get_object_info",
                json!({"name": arg_or(args, "object_name", json!(""))}),
            )
            .await?;
        Ok(pretty(&result))
    }

    async fn execute_blender_code(&mut self, args: &Value) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command(
                "execute_code",
                json!({"code": arg_or(args, "code", json!(""))}),
            )
            .await?;
        Ok(format!(
            "Code executed: {}",
            result.get("result").map_or_else(String::new, display_value)
        ))
    }

    async fn get_viewport_screenshot(&mut self, args: &Value) -> Result<String, DispatchError> {
        let temp_path =
            std::env::temp_dir().join(format!("blender_screenshot_{}.png", std::process::id()));

        let result = self
            .connection
            .send_command(
                "get_viewport_screenshot",
                json!({
                    "max_size": arg_or(args, "max_size", json!(800)),
                    "filepath": temp_path.to_string_lossy(),
                    "format": "png",
                }),
            )
            .await?;

        if let Some(error) = result.get("error") {
            return Ok(format!("Screenshot error: {}", display_value(error)));
        }

        // The addon writes the capture to the temp file; hand back an
        // inline preview and clean up.
        match tokio::fs::read(&temp_path).await {
            Ok(bytes) => {
                let encoded = BASE64_STANDARD.encode(bytes);
                if let Err(e) = tokio::fs::remove_file(&temp_path).await {
                    debug!(error = %e, "failed to remove screenshot temp file");
                }
                let preview: String = encoded.chars().take(100).collect();
                Ok(format!(
                    "Screenshot captured (base64): data:image/png;base64,{preview}..."
                ))
            }
            Err(_) => Ok("Screenshot saved to temp file".to_string()),
        }
    }

    // Integration status checks share one shape

    async fn integration_status(
        &mut self,
        command: &str,
        fallback: &str,
    ) -> Result<String, DispatchError> {
        let result = self.connection.send_command(command, json!({})).await?;
        Ok(message_or(&result, fallback))
    }

    // PolyHaven tools

    async fn get_polyhaven_categories(&mut self, args: &Value) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command(
                "get_polyhaven_categories",
                json!({"asset_type": arg_or(args, "asset_type", json!("hdris"))}),
            )
            .await?;

        let mut entries: Vec<(String, i64)> = result
            .get("categories")
            .and_then(Value::as_object)
            .map(|categories| {
                categories
                    .iter()
                    .map(|(name, count)| (name.clone(), count.as_i64().unwrap_or(0)))
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by(|a, b| b.1.cmp(&a.1));

        let lines: Vec<String> = entries
            .iter()
            .map(|(name, count)| format!("- {name}: {count} assets"))
            .collect();
        Ok(format!("Categories:\n{}", lines.join("\n")))
    }

    async fn search_polyhaven_assets(&mut self, args: &Value) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command(
                "search_polyhaven_assets",
                json!({
                    "asset_type": arg_or(args, "asset_type", json!("all")),
                    "categories": arg(args, "categories"),
                }),
            )
            .await?;

        let total = result.get("total_count").and_then(Value::as_i64).unwrap_or(0);
        let lines: Vec<String> = result
            .get("assets")
            .and_then(Value::as_object)
            .map(|assets| {
                assets
                    .iter()
                    .take(MAX_LISTED_RESULTS)
                    .map(|(id, data)| {
                        let name = data.get("name").map_or_else(|| id.clone(), display_value);
                        format!("- {name} (ID: {id})")
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(format!("Found {total} assets:\n{}", lines.join("\n")))
    }

    async fn download_polyhaven_asset(&mut self, args: &Value) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command(
                "download_polyhaven_asset",
                json!({
                    "asset_id": arg(args, "asset_id"),
                    "asset_type": arg(args, "asset_type"),
                    "resolution": arg_or(args, "resolution", json!("1k")),
                    "file_format": arg(args, "file_format"),
                }),
            )
            .await?;
        Ok(message_or(&result, "Asset downloaded"))
    }

    async fn set_texture(&mut self, args: &Value) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command(
                "set_texture",
                json!({
                    "object_name": arg(args, "object_name"),
                    "texture_id": arg(args, "texture_id"),
                }),
            )
            .await?;
        Ok(format!("Texture applied: {}", message_or(&result, "success")))
    }

    // Sketchfab tools

    async fn search_sketchfab_models(&mut self, args: &Value) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command(
                "search_sketchfab_models",
                json!({
                    "query": arg_or(args, "query", json!("")),
                    "categories": arg(args, "categories"),
                    "count": arg_or(args, "count", json!(20)),
                    "downloadable": arg_or(args, "downloadable", json!(true)),
                }),
            )
            .await?;

        let models = result
            .get("results")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice);
        let lines: Vec<String> = models
            .iter()
            .take(MAX_LISTED_RESULTS)
            .map(|model| {
                let name = model
                    .get("name")
                    .map_or_else(|| "Unnamed".to_string(), display_value);
                let uid = model
                    .get("uid")
                    .map_or_else(|| "?".to_string(), display_value);
                format!("- {name} (UID: {uid})")
            })
            .collect();
        Ok(format!("Found {} models:\n{}", models.len(), lines.join("\n")))
    }

    async fn download_sketchfab_model(&mut self, args: &Value) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command(
                "download_sketchfab_model",
                json!({"uid": arg(args, "uid")}),
            )
            .await?;

        let objects = result
            .get("imported_objects")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice);
        if objects.is_empty() {
            Ok("Model imported".to_string())
        } else {
            let names: Vec<String> = objects.iter().map(display_value).collect();
            Ok(format!("Imported: {}", names.join(", ")))
        }
    }

    // Hyper3D tools

    async fn generate_hyper3d_model_via_text(
        &mut self,
        args: &Value,
    ) -> Result<String, DispatchError> {
        let bbox = process_bbox(args.get("bbox_condition"))?;
        let result = self
            .connection
            .send_command(
                "create_rodin_job",
                json!({
                    "text_prompt": arg(args, "text_prompt"),
                    "images": Value::Null,
                    "bbox_condition": bbox,
                }),
            )
            .await?;
        Ok(render_rodin_submission(&result))
    }

    async fn generate_hyper3d_model_via_images(
        &mut self,
        args: &Value,
    ) -> Result<String, DispatchError> {
        let bbox = process_bbox(args.get("bbox_condition"))?;

        let images = match args.get("input_image_paths").and_then(Value::as_array) {
            Some(paths) if !paths.is_empty() => json!(encode_image_files(paths).await?),
            _ => Value::Null,
        };

        let result = self
            .connection
            .send_command(
                "create_rodin_job",
                json!({
                    "text_prompt": Value::Null,
                    "images": images,
                    "image_urls": arg(args, "input_image_urls"),
                    "bbox_condition": bbox,
                }),
            )
            .await?;
        Ok(render_rodin_submission(&result))
    }

    async fn poll_rodin_job_status(&mut self, args: &Value) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command(
                "poll_rodin_job_status",
                json!({
                    "subscription_key": arg(args, "subscription_key"),
                    "request_id": arg(args, "request_id"),
                }),
            )
            .await?;
        Ok(result.to_string())
    }

    async fn import_generated_asset(&mut self, args: &Value) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command(
                "import_generated_asset",
                json!({
                    "name": arg(args, "name"),
                    "task_uuid": arg(args, "task_uuid"),
                    "request_id": arg(args, "request_id"),
                }),
            )
            .await?;
        Ok(format!("Imported: {}", message_or(&result, "success")))
    }

    // Hunyuan3D tools

    async fn generate_hunyuan3d_model(&mut self, args: &Value) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command(
                "generate_hunyuan3d_model",
                json!({
                    "text_prompt": arg(args, "text_prompt"),
                    "input_image_url": arg(args, "input_image_url"),
                }),
            )
            .await?;
        Ok(result.to_string())
    }

    async fn poll_hunyuan_job_status(&mut self, args: &Value) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command(
                "poll_hunyuan_job_status",
                json!({"job_id": arg(args, "job_id")}),
            )
            .await?;
        Ok(result.to_string())
    }

    async fn import_generated_asset_hunyuan(
        &mut self,
        args: &Value,
    ) -> Result<String, DispatchError> {
        let result = self
            .connection
            .send_command(
                "import_generated_asset_hunyuan",
                json!({
                    "name": arg(args, "name"),
                    "zip_file_url": arg(args, "zip_file_url"),
                }),
            )
            .await?;
        Ok(format!("Imported: {}", message_or(&result, "success")))
    }
}

/// Argument by key, `null` when absent.
fn arg(args: &Value, key: &str) -> Value {
    args.get(key).cloned().unwrap_or(Value::Null)
}

/// Argument by key with a default for the absent case.
fn arg_or(args: &Value, key: &str, default: Value) -> Value {
    args.get(key).cloned().unwrap_or(default)
}

/// Renders a value the way it reads best in a text reply: strings bare,
/// everything else as compact JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The `message` field of a reply, or a fallback when absent.
fn message_or(result: &Value, fallback: &str) -> String {
    result
        .get("message")
        .map_or_else(|| fallback.to_string(), display_value)
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Python-style truthiness for reply fields.
fn truthy(value: Option<&Value>) -> bool {
    value.is_some_and(|v| match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    })
}

/// Renders the reply to a Rodin job submission. A `submit_time` field
/// marks an accepted job, in which case only the identifiers the caller
/// needs for polling are returned.
fn render_rodin_submission(result: &Value) -> String {
    if truthy(result.get("submit_time")) {
        json!({
            "task_uuid": result.get("uuid").cloned().unwrap_or(Value::Null),
            "subscription_key": result
                .get("jobs")
                .and_then(|jobs| jobs.get("subscription_key"))
                .cloned()
                .unwrap_or(Value::Null),
        })
        .to_string()
    } else {
        result.to_string()
    }
}

/// Validates and normalises a `bbox_condition` argument.
///
/// Components must all be strictly positive. An all-integer box is
/// passed through untouched; anything else is rescaled so the largest
/// component becomes 100, truncating toward zero.
#[allow(clippy::cast_possible_truncation)] // truncation toward zero is the rescale rounding
fn process_bbox(raw: Option<&Value>) -> Result<Value, DispatchError> {
    let Some(value) = raw else {
        return Ok(Value::Null);
    };
    if value.is_null() {
        return Ok(Value::Null);
    }
    let Some(items) = value.as_array() else {
        return Err(DispatchError::BboxNotNumeric);
    };

    let mut components = Vec::with_capacity(items.len());
    for item in items {
        let Some(component) = item.as_f64() else {
            return Err(DispatchError::BboxNotNumeric);
        };
        components.push(component);
    }

    if components.iter().any(|&c| c <= 0.0) {
        return Err(DispatchError::BboxNotPositive);
    }

    if items.iter().all(|item| item.is_i64() || item.is_u64()) {
        return Ok(value.clone());
    }

    let largest = components.iter().copied().fold(0.0f64, f64::max);
    let scaled: Vec<i64> = components
        .iter()
        .map(|&c| (c / largest * 100.0) as i64)
        .collect();
    Ok(json!(scaled))
}

async fn encode_image_files(paths: &[Value]) -> Result<Vec<String>, DispatchError> {
    let mut encoded = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(path) = path.as_str() else {
            return Err(DispatchError::ImagePathNotAString);
        };
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| DispatchError::ImageRead {
                path: PathBuf::from(path),
                source,
            })?;
        encoded.push(BASE64_STANDARD.encode(bytes));
    }
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlenderConfig;

    fn offline_dispatcher() -> ToolDispatcher {
        // The gateway is never dialled in these tests
        let config = BlenderConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            command_timeout_secs: 1,
        };
        ToolDispatcher::new(BlenderConnection::new(&config), Telemetry::disabled())
    }

    #[tokio::test]
    async fn unknown_tool_renders_error_text() {
        let mut dispatcher = offline_dispatcher();
        let text = dispatcher.dispatch("does_not_exist", &json!({})).await;
        assert_eq!(text, "Error: Unknown tool: does_not_exist");
    }

    #[test]
    fn bbox_absent_is_null() {
        assert_eq!(process_bbox(None).unwrap(), Value::Null);
        assert_eq!(process_bbox(Some(&Value::Null)).unwrap(), Value::Null);
    }

    #[test]
    fn bbox_integers_pass_through() {
        let bbox = json!([2, 4, 8]);
        assert_eq!(process_bbox(Some(&bbox)).unwrap(), json!([2, 4, 8]));
    }

    #[test]
    fn bbox_ratios_rescale_to_largest_100() {
        let bbox = json!([2.0, 4.0, 8.0]);
        assert_eq!(process_bbox(Some(&bbox)).unwrap(), json!([25, 50, 100]));
    }

    #[test]
    fn bbox_mixed_numbers_rescale_with_truncation() {
        let bbox = json!([1, 2.5, 4]);
        assert_eq!(process_bbox(Some(&bbox)).unwrap(), json!([25, 62, 100]));
    }

    #[test]
    fn bbox_with_zero_component_is_rejected() {
        let bbox = json!([0, 1, 2]);
        let err = process_bbox(Some(&bbox)).unwrap_err();
        assert!(matches!(err, DispatchError::BboxNotPositive));
        assert_eq!(err.to_string(), "bbox must be > 0");
    }

    #[test]
    fn bbox_with_negative_component_is_rejected() {
        let bbox = json!([0.5, -1.0, 2.0]);
        assert!(matches!(
            process_bbox(Some(&bbox)).unwrap_err(),
            DispatchError::BboxNotPositive
        ));
    }

    #[test]
    fn bbox_non_numeric_is_rejected() {
        for bbox in [json!(["a", "b"]), json!("not an array"), json!(5)] {
            assert!(matches!(
                process_bbox(Some(&bbox)).unwrap_err(),
                DispatchError::BboxNotNumeric
            ));
        }
    }

    #[test]
    fn truthiness_follows_python_rules() {
        assert!(!truthy(None));
        assert!(!truthy(Some(&Value::Null)));
        assert!(!truthy(Some(&json!(false))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&json!([]))));
        assert!(!truthy(Some(&json!({}))));
        assert!(truthy(Some(&json!(true))));
        assert!(truthy(Some(&json!(1))));
        assert!(truthy(Some(&json!("2024-01-01T00:00:00Z"))));
        assert!(truthy(Some(&json!({"k": "v"}))));
    }

    #[test]
    fn rodin_submission_extracts_polling_identifiers() {
        let result = json!({
            "submit_time": "2024-05-01T10:00:00Z",
            "uuid": "task-1",
            "jobs": {"subscription_key": "sub-9"},
            "noise": true,
        });
        let text = render_rodin_submission(&result);
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!({"task_uuid": "task-1", "subscription_key": "sub-9"}));
    }

    #[test]
    fn rodin_submission_without_submit_time_passes_through() {
        let result = json!({"error": "quota exceeded"});
        let text = render_rodin_submission(&result);
        assert_eq!(text, result.to_string());
    }

    #[test]
    fn message_or_prefers_string_field() {
        assert_eq!(message_or(&json!({"message": "ready"}), "fallback"), "ready");
        assert_eq!(message_or(&json!({}), "fallback"), "fallback");
        assert_eq!(message_or(&json!({"message": 7}), "fallback"), "7");
    }

    #[tokio::test]
    async fn image_files_are_base64_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.png");
        std::fs::write(&path, b"fake image bytes").unwrap();

        let paths = [json!(path.to_str().unwrap())];
        let encoded = encode_image_files(&paths).await.unwrap();
        assert_eq!(encoded, vec![BASE64_STANDARD.encode(b"fake image bytes")]);
    }

    #[tokio::test]
    async fn missing_image_file_reports_its_path() {
        let paths = [json!("/definitely/not/here.png")];
        let err = encode_image_files(&paths).await.unwrap_err();
        assert!(matches!(err, DispatchError::ImageRead { .. }));
        assert!(err.to_string().contains("/definitely/not/here.png"));
    }

    #[tokio::test]
    async fn non_string_image_path_is_rejected() {
        let paths = [json!(42)];
        let err = encode_image_files(&paths).await.unwrap_err();
        assert!(matches!(err, DispatchError::ImagePathNotAString));
    }

    #[test]
    fn arguments_fall_back_per_key() {
        let args = json!({"present": "x"});
        assert_eq!(arg(&args, "present"), json!("x"));
        assert_eq!(arg(&args, "absent"), Value::Null);
        assert_eq!(arg_or(&args, "absent", json!(800)), json!(800));
        // Null arguments behave as an empty mapping
        assert_eq!(arg_or(&Value::Null, "anything", json!(1)), json!(1));
    }
}
