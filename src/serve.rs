use crate::config::ServeConfig;
use crate::error::{ApiError, InferenceError};
use crate::model::model_manager::ModelHolder;
use crate::model::normalize::{confidence, normalize, PredictionValue};
use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpResponse, HttpServer, Responder};
use log::{debug, error, info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug, Clone)]
pub struct PredictionRequest {
    pub features: Vec<f64>,
    /// Client-side correlation id, echoed to the logs only.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct PredictionResponse {
    pub prediction: PredictionValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

#[derive(Serialize)]
struct RootResponse {
    message: String,
    model_loaded: bool,
    docs: String,
}

#[derive(Serialize)]
struct HealthcheckResponse {
    status: String,
    model_loaded: bool,
}

#[derive(Serialize)]
struct EndpointDoc {
    method: &'static str,
    path: &'static str,
    description: &'static str,
}

#[derive(Serialize)]
struct DocsResponse {
    version: &'static str,
    endpoints: Vec<EndpointDoc>,
}

/// Runs one inference for a single feature vector.
pub async fn predict(
    holder: &ModelHolder,
    request: PredictionRequest,
) -> Result<PredictionResponse, ApiError> {
    let model = holder.current().ok_or(ApiError::ModelUnavailable)?;
    if request.features.is_empty() {
        return Err(ApiError::Validation(
            "features must contain at least one value".to_string(),
        ));
    }

    let n_features = request.features.len();
    let features =
        Array2::from_shape_vec((1, n_features), request.features).map_err(InferenceError::from)?;
    let inference = model.infer(&features).await?;

    let prediction = normalize(inference.prediction)?;
    let probability = match inference.probabilities.as_deref() {
        Some(row) => {
            let probability = confidence(row);
            if probability.is_none() {
                warn!("probability output {row:?} is not a distribution; omitting it");
            }
            probability
        }
        None => None,
    };

    Ok(PredictionResponse {
        prediction,
        probability,
    })
}

async fn root(holder: web::Data<ModelHolder>) -> impl Responder {
    let response = RootResponse {
        message: "ML API running".to_string(),
        model_loaded: holder.is_loaded(),
        docs: "/docs".to_string(),
    };
    HttpResponse::Ok().json(response)
}

async fn healthcheck(holder: web::Data<ModelHolder>) -> Result<HttpResponse, ApiError> {
    if !holder.is_loaded() {
        return Err(ApiError::ModelUnavailable);
    }
    let response = HealthcheckResponse {
        status: "ok".to_string(),
        model_loaded: true,
    };
    Ok(HttpResponse::Ok().json(response))
}

async fn docs() -> impl Responder {
    let response = DocsResponse {
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            EndpointDoc {
                method: "GET",
                path: "/",
                description: "service metadata and model status",
            },
            EndpointDoc {
                method: "GET",
                path: "/health",
                description: "200 when a model is loaded, 503 otherwise",
            },
            EndpointDoc {
                method: "POST",
                path: "/predict",
                description: "body {features: [number], user_id?: string}; \
                              returns {prediction, probability?}",
            },
        ],
    };
    HttpResponse::Ok().json(response)
}

async fn predict_handler(
    holder: web::Data<ModelHolder>,
    body: Result<web::Json<PredictionRequest>, actix_web::Error>,
) -> Result<HttpResponse, ApiError> {
    // availability wins over body validation
    if !holder.is_loaded() {
        return Err(ApiError::ModelUnavailable);
    }
    let request = body
        .map_err(|e| ApiError::Validation(e.to_string()))?
        .into_inner();
    if let Some(user_id) = &request.user_id {
        debug!("prediction requested by {user_id}");
    }

    match predict(&holder, request).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => {
            if let ApiError::InferenceFailure(_) = e {
                error!("{e}");
            }
            Err(e)
        }
    }
}

/// Registers the service routes; shared by the server and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root))
        .route("/health", web::get().to(healthcheck))
        .route("/docs", web::get().to(docs))
        .route("/predict", web::post().to(predict_handler));
}

fn cors(origins: &[String]) -> Cors {
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| {
            if origin == "*" {
                cors.allow_any_origin()
            } else {
                cors.allowed_origin(origin)
            }
        })
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
}

pub async fn run_server(config: ServeConfig) -> std::io::Result<()> {
    let holder = web::Data::new(ModelHolder::from_path(&config.model_path));
    let origins = config.cors_origins.clone();
    info!(
        "Serving on {} (allowed origins: {:?})",
        config.bind_address(),
        origins
    );

    HttpServer::new(move || {
        App::new()
            .wrap(cors(&origins))
            .wrap(middleware::Logger::default())
            .app_data(holder.clone())
            .configure(configure)
    })
    .bind(config.bind_address())?
    .run()
    .await
}
