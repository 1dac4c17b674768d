//! The Gaia tool set.

use gaia_mcp_common::error::{Error, Result};
use rmcp::model::{CallToolResult, Content};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::adapter::{ToolOutput, typed};
use crate::client::{ImagesResponse, SdStyle};
use crate::context::InvocationContext;
use crate::registry::{ParamKind, ParamSpec, RegistryError, Tool, ToolRegistry};

/// MIME type attached to every image item returned by the tools.
pub const IMAGE_MIME_TYPE: &str = "image/png";

/// Recipe ids on the Gaia platform.
pub mod recipes {
    pub const IMAGE_GENERATOR_SIMPLE: &str = "image-generator-simple";
    pub const REMIX: &str = "remix";
    pub const FACE_ENHANCER: &str = "face-enhancer";
    pub const UPSCALER: &str = "upscaler";
}

/// Model used by the upscaler recipe.
pub const UPSCALE_MODE: &str = "4x-Ultrasharp.pt";

pub const DEFAULT_UPSCALE_RATIO: f64 = 2.0;
pub const MIN_UPSCALE_RATIO: f64 = 1.0;
pub const MAX_UPSCALE_RATIO: f64 = 4.0;

/// All tools, in registration order.
pub fn builtin() -> std::result::Result<ToolRegistry, RegistryError> {
    ToolRegistry::from_tools([
        upload_image(),
        create_style(),
        generate_image(),
        remix(),
        face_enhancer(),
        upscaler(),
    ])
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageArgs {
    pub image_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStyleArgs {
    pub image_urls: Vec<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageArgs {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RemixArgs {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FaceEnhancerArgs {
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct UpscalerArgs {
    pub image: String,
    #[serde(default)]
    pub ratio: Option<f64>,
}

fn upload_image() -> Tool {
    Tool::new(
        "upload-image",
        "Upload images to the Gaia platform",
        vec![ParamSpec::required(
            "imageUrls",
            ParamKind::array_of(ParamKind::String),
            "The URLs of the images to upload",
        )],
        typed(|args: UploadImageArgs, ctx: InvocationContext| async move {
            let client = ctx.api_client()?;
            let report = client.upload_images(&args.image_urls).await;

            let summary = format!("Uploaded {} images", report.uploaded.len());
            let mut content = vec![Content::text(summary)];
            if !report.failed.is_empty() {
                let failures: Vec<String> = report
                    .failed
                    .iter()
                    .map(|failure| format!("{} ({})", failure.url, failure.error))
                    .collect();
                content.push(Content::text(format!(
                    "Failed to upload {} images: {}",
                    report.failed.len(),
                    failures.join(", ")
                )));
            }
            content.extend(
                report
                    .uploaded
                    .iter()
                    .map(|file| {
                        Content::image(file.url.clone().unwrap_or_default(), IMAGE_MIME_TYPE)
                    }),
            );

            Ok(CallToolResult::success(content).into())
        }),
    )
}

fn create_style() -> Tool {
    Tool::new(
        "create-style",
        "Create a new style in the Gaia platform using provided images",
        vec![
            ParamSpec::required(
                "imageUrls",
                ParamKind::array_of(ParamKind::String),
                "The URLs of the images to use for the style",
            ),
            ParamSpec::required("name", ParamKind::String, "The name of the style to create"),
            ParamSpec::optional(
                "description",
                ParamKind::String,
                "Optional description for the style",
            ),
        ],
        typed(|args: CreateStyleArgs, ctx: InvocationContext| async move {
            info!(style = %args.name, images = args.image_urls.len(), "Starting style creation");
            match upload_and_create_style(&ctx, &args).await {
                Ok(style) => {
                    info!(style_id = %style.id, "Style created");
                    let pretty = serde_json::to_string_pretty(&style)?;
                    let mut content = vec![Content::text(format!(
                        "Successfully created style \"{}\" with ID {}\nResult:\n\n```json\n{}\n```",
                        args.name, style.id, pretty
                    ))];
                    if let Some(thumbnail) = style.thumbnail_url {
                        content.push(Content::image(thumbnail, IMAGE_MIME_TYPE));
                    }
                    Ok(CallToolResult::success(content).into())
                }
                Err(e) => Ok(failure("create style", &e)),
            }
        }),
    )
}

fn generate_image() -> Tool {
    Tool::new(
        "generate-image",
        "Generate images with Protogaia",
        vec![
            ParamSpec::required(
                "prompt",
                ParamKind::String,
                "Text description of the image to generate",
            ),
            ParamSpec::optional(
                "aspectRatio",
                ParamKind::String,
                "Aspect ratio of the generated image, e.g. 1:1, 16:9",
            ),
            ParamSpec::optional("style", ParamKind::String, "Id of a Gaia style to apply"),
        ],
        typed(|args: GenerateImageArgs, ctx: InvocationContext| async move {
            let params = serde_json::to_value(&args)?;
            match run_recipe(&ctx, recipes::IMAGE_GENERATOR_SIMPLE, params).await {
                Ok(images) => Ok(images_result(
                    format!("Successfully generated {} images", images.len()),
                    images,
                )),
                Err(e) => Ok(failure("generate images", &e)),
            }
        }),
    )
}

fn remix() -> Tool {
    Tool::new(
        "remix",
        "Create new variations of an existing image",
        vec![
            ParamSpec::required("image", ParamKind::String, "URL of the image to remix"),
            ParamSpec::optional(
                "prompt",
                ParamKind::String,
                "Text guiding how the variations should differ",
            ),
            ParamSpec::optional(
                "similarity",
                ParamKind::Number,
                "How close the variations stay to the original",
            ),
        ],
        typed(|args: RemixArgs, ctx: InvocationContext| async move {
            let params = serde_json::to_value(&args)?;
            match run_recipe(&ctx, recipes::REMIX, params).await {
                Ok(images) => Ok(images_result(
                    format!("Successfully created {} variations of the image", images.len()),
                    images,
                )),
                Err(e) => Ok(failure("create variations of the image", &e)),
            }
        }),
    )
}

fn face_enhancer() -> Tool {
    Tool::new(
        "face-enhancer",
        "Enhance face's details in an existing image",
        vec![ParamSpec::required(
            "image",
            ParamKind::String,
            "URL of the image whose faces should be enhanced",
        )],
        typed(|args: FaceEnhancerArgs, ctx: InvocationContext| async move {
            let params = serde_json::to_value(&args)?;
            match run_recipe(&ctx, recipes::FACE_ENHANCER, params).await {
                Ok(images) => Ok(images_result(
                    "Successfully enhanced face's details in the image".to_string(),
                    images,
                )),
                Err(e) => Ok(failure("enhance face's details in the image", &e)),
            }
        }),
    )
}

fn upscaler() -> Tool {
    Tool::new(
        "upscaler",
        "Enhance the resolution quality of images",
        vec![
            ParamSpec::required(
                "image",
                ParamKind::String,
                "The image URL to upscale. It must be a valid GAIA's image URL",
            ),
            ParamSpec::optional(
                "ratio",
                ParamKind::Number,
                "The ratio to upscale the image. It must be a number between 1 and 4",
            ),
        ],
        typed(|args: UpscalerArgs, ctx: InvocationContext| async move {
            let ratio = args.ratio.unwrap_or(DEFAULT_UPSCALE_RATIO);
            if !(MIN_UPSCALE_RATIO..=MAX_UPSCALE_RATIO).contains(&ratio) {
                return Err(Error::validation(format!(
                    "ratio must be between {} and {}, got {}",
                    MIN_UPSCALE_RATIO, MAX_UPSCALE_RATIO, ratio
                )));
            }

            let params = json!({
                "image": args.image,
                "upscale_mode": UPSCALE_MODE,
                "upscale_ratio": ratio,
            });
            match run_recipe(&ctx, recipes::UPSCALER, params).await {
                Ok(images) => Ok(images_result("Upscaled image".to_string(), images)),
                Err(e) => Ok(failure("upscale image", &e)),
            }
        }),
    )
}

async fn upload_and_create_style(
    ctx: &InvocationContext,
    args: &CreateStyleArgs,
) -> Result<SdStyle> {
    let client = ctx.api_client()?;
    let report = client.upload_images(&args.image_urls).await;
    let urls = report.urls();
    if urls.is_empty() {
        return Err(Error::validation("No images were successfully uploaded"));
    }
    info!(uploaded = urls.len(), total = args.image_urls.len(), "Uploaded style images");
    client
        .create_style(&urls, &args.name, args.description.as_deref())
        .await
}

/// Run a generation recipe, treating an error-only response as a failure.
async fn run_recipe(
    ctx: &InvocationContext,
    recipe_id: &str,
    params: Value,
) -> Result<Vec<String>> {
    info!(recipe = recipe_id, "Calling Gaia API");
    let client = ctx.api_client()?;
    let ImagesResponse { images, error } = client.generate_images(recipe_id, params).await?;
    match error {
        Some(message) if images.is_empty() => Err(Error::api(recipe_id, 200, message)),
        _ => {
            info!(recipe = recipe_id, images = images.len(), "Recipe completed");
            Ok(images)
        }
    }
}

fn images_result(summary: String, images: Vec<String>) -> ToolOutput {
    let mut content = Vec::with_capacity(images.len() + 1);
    content.push(Content::text(summary));
    content.extend(images.into_iter().map(|image| Content::image(image, IMAGE_MIME_TYPE)));
    CallToolResult::success(content).into()
}

fn failure(action: &str, err: &Error) -> ToolOutput {
    let message = match err {
        Error::Api { message, .. } => message.clone(),
        other => other.to_string(),
    };
    error!(error = %err, "Failed to {}", action);
    CallToolResult::error(vec![Content::text(format!("Failed to {}: {}", action, message))]).into()
}
