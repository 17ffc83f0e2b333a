use actix_cors::Cors;
use actix_web::{
    get, post, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult,
};
use actix_ws::Message;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use weftcore::{Graph, GraphSpec, NodeTypeRegistry, TokenId, Value};
use weftruntime::{RuntimeConfig, WorkflowRuntime};

/// Application state shared across handlers
struct AppState {
    runtime: Arc<WorkflowRuntime>,
}

/// Request body for starting a process
#[derive(Debug, Deserialize)]
struct StartRequest {
    #[serde(default)]
    payload: serde_json::Value,
}

/// Request body for completing a parked task
#[derive(Debug, Deserialize)]
struct CompleteTaskRequest {
    #[serde(default)]
    label: String,
}

/// Response for graph registration
#[derive(Debug, Serialize)]
struct GraphResponse {
    id: Uuid,
    message: String,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "weft"
    }))
}

/// List registered graphs
#[get("/api/graphs")]
async fn list_graphs(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let graphs = data.runtime.list_graphs().await;
    let graph_list: Vec<_> = graphs
        .iter()
        .map(|g| {
            serde_json::json!({
                "id": g.id(),
                "name": g.name(),
                "nodes": g.node_count(),
                "arcs": g.arc_count(),
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(graph_list))
}

/// Register a new graph
#[post("/api/graphs")]
async fn create_graph(
    data: web::Data<AppState>,
    spec: web::Json<GraphSpec>,
) -> ActixResult<impl Responder> {
    let spec = spec.into_inner();
    let name = spec.name.clone();

    let graph = match Graph::from_spec(spec) {
        Ok(graph) => graph,
        Err(e) => {
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            }))
        }
    };

    match data.runtime.register_graph(graph).await {
        Ok(id) => {
            info!("Registered graph: {} ({})", name, id);
            Ok(HttpResponse::Created().json(GraphResponse {
                id,
                message: "Graph registered successfully".to_string(),
            }))
        }
        Err(issues) => {
            let messages: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
            Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "graph failed validation",
                "issues": messages,
            })))
        }
    }
}

/// Get a specific graph
#[get("/api/graphs/{id}")]
async fn get_graph(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let graph_id = path.into_inner();

    match data.runtime.graph(graph_id).await {
        Some(graph) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "id": graph.id(),
            "name": graph.name(),
            "nodes": graph.nodes().collect::<Vec<_>>(),
            "arcs": graph.arcs().collect::<Vec<_>>(),
        }))),
        None => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Graph {} not found", graph_id),
        })),
    }
}

/// Remove a graph
#[actix_web::delete("/api/graphs/{id}")]
async fn delete_graph(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let graph_id = path.into_inner();

    if data.runtime.remove_graph(graph_id).await {
        info!("Removed graph: {}", graph_id);
        Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Graph removed successfully"
        })))
    } else {
        Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Graph {} not found", graph_id),
        }))
    }
}

/// Start a process on a graph
#[post("/api/graphs/{id}/processes")]
async fn start_process(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<StartRequest>,
) -> ActixResult<impl Responder> {
    let graph_id = path.into_inner();
    let payload = Value::from_json(req.into_inner().payload);

    info!("Starting process on graph: {}", graph_id);

    match data.runtime.start_process(graph_id, payload).await {
        Ok(view) => Ok(HttpResponse::Created().json(view)),
        Err(e) => {
            error!("Process start on graph {} failed: {}", graph_id, e);
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            }))
        }
    }
}

/// List live processes
#[get("/api/processes")]
async fn list_processes(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    Ok(HttpResponse::Ok().json(data.runtime.list_processes().await))
}

/// Inspect one process
#[get("/api/processes/{id}")]
async fn get_process(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let process_id = path.into_inner();

    match data.runtime.process_view(process_id).await {
        Some(view) => Ok(HttpResponse::Ok().json(view)),
        None => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Process {} not found", process_id),
        })),
    }
}

/// Complete a parked task token along a label
#[post("/api/processes/{id}/tokens/{token_id}/complete")]
async fn complete_task(
    data: web::Data<AppState>,
    path: web::Path<(Uuid, u64)>,
    req: web::Json<CompleteTaskRequest>,
) -> ActixResult<impl Responder> {
    let (process_id, token_id) = path.into_inner();
    let label = req.into_inner().label;

    info!(
        "Completing token {} of process {} along '{}'",
        token_id, process_id, label
    );

    match data
        .runtime
        .complete_task(process_id, TokenId(token_id), &label)
        .await
    {
        Ok(view) => Ok(HttpResponse::Ok().json(view)),
        Err(e) => {
            error!("Task completion failed: {}", e);
            Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            }))
        }
    }
}

/// WebSocket endpoint for real-time events
#[get("/api/events")]
async fn websocket_events(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    info!("WebSocket client connected");

    let mut events = data.runtime.subscribe_events();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if let Ok(json) = serde_json::to_string(&event) {
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(_) => break,
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("WebSocket client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}

/// List available node types
#[get("/api/nodes")]
async fn list_node_types(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let registry = data.runtime.registry();
    Ok(HttpResponse::Ok().json(registry.list_type_names()))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("🚀 Starting Weft Server");

    let mut registry = NodeTypeRegistry::standard();
    weftnodes::register_all(&mut registry);

    let runtime = WorkflowRuntime::with_registry(Arc::new(registry), RuntimeConfig::default());

    info!("✅ Runtime initialized with standard node types");

    let app_state = web::Data::new(AppState {
        runtime: Arc::new(runtime),
    });

    let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    info!("🌐 Server starting on http://{}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(list_graphs)
            .service(create_graph)
            .service(get_graph)
            .service(delete_graph)
            .service(start_process)
            .service(list_processes)
            .service(get_process)
            .service(complete_task)
            .service(websocket_events)
            .service(list_node_types)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
