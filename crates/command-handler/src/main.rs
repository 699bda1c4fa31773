use application::TodoService;
use domain::{AttachmentStorage, CreateTodoRequest, TodoId, TodoRepository, UpdateTodoRequest};
use infrastructure::{load_sdk_config, DynamoDbClient, DynamoDbTodoRepository, S3AttachmentStorage};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use shared::{
    error_response, extract_user_id, init_tracing, success_response,
    telemetry::trace_http_request, trace_lambda_handler, ApiGatewayProxyRequest,
    ApiGatewayProxyResponse, AppError, Config,
};
use tracing::{error, info};

/// コマンドの種類を表す列挙型
#[derive(Debug)]
enum Command {
    CreateTodo(CreateTodoRequest),
    UpdateTodo {
        todo_id: TodoId,
        request: UpdateTodoRequest,
        /// クライアントが送ったままのボディ
        body: Value,
    },
    DeleteTodo {
        todo_id: TodoId,
    },
    CreateAttachmentUploadUrl {
        todo_id: TodoId,
    },
    DeleteAttachment {
        todo_id: TodoId,
    },
}

/// `/todos` 以下のパスの形
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Collection,
    Item(&'a str),
    Attachment(&'a str),
}

/// コマンドハンドラーのメイン関数
async fn function_handler(
    event: LambdaEvent<ApiGatewayProxyRequest>,
) -> Result<ApiGatewayProxyResponse, Error> {
    let (payload, context) = event.into_parts();

    // トレーシングでラップされたハンドラー実行
    trace_lambda_handler!(
        "command-handler",
        payload,
        context,
        |payload: ApiGatewayProxyRequest, _context| async move {
            info!(
                "CommandHandler開始: method={}, path={}",
                payload.http_method, payload.path
            );

            // 設定を読み込み
            let config = Config::from_env().map_err(|e| {
                error!("設定読み込みエラー: {}", e);
                Error::from(format!("設定エラー: {e}"))
            })?;

            // SDK 設定は一度だけ読み込み、DynamoDB と S3 で共有する
            let sdk_config = load_sdk_config(&config).await;

            let db_client = DynamoDbClient::from_sdk_config(&sdk_config, &config).map_err(|e| {
                error!("DynamoDBクライアント初期化エラー: {}", e);
                Error::from(format!("DynamoDBエラー: {e}"))
            })?;

            let service = TodoService::new(
                DynamoDbTodoRepository::from_config(db_client, &config),
                S3AttachmentStorage::from_sdk_config(&sdk_config, &config),
            );

            let response = handle_request(&payload, &service).await;
            info!("CommandHandler完了: status={}", response.status_code);
            Ok(response)
        }
    )
}

/// リクエストを処理し、エラーはレスポンスに変換する
async fn handle_request<R, S>(
    request: &ApiGatewayProxyRequest,
    service: &TodoService<R, S>,
) -> ApiGatewayProxyResponse
where
    R: TodoRepository,
    S: AttachmentStorage,
{
    let user_id = extract_user_id(request);

    let result = match &user_id {
        Ok(user_id) => {
            info!("ユーザー認証成功: user_id={}", user_id);
            match parse_command(request) {
                Ok(command) => execute_command(command, user_id, service).await,
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e.clone()),
    };

    let response = result.unwrap_or_else(|e| {
        e.log();
        error_response(e.http_status_code(), &e.user_message())
    });

    trace_http_request(
        &request.http_method,
        &request.path,
        response.status_code,
        user_id.as_deref().ok(),
    );
    response
}

/// リクエストからコマンドをパース
fn parse_command(request: &ApiGatewayProxyRequest) -> Result<Command, AppError> {
    let method = request.http_method.as_str();
    let route = parse_route(&request.path).ok_or_else(|| not_found(request))?;

    match (method, route) {
        ("POST", Route::Collection) => Ok(Command::CreateTodo(parse_body(request)?)),
        ("PATCH", Route::Item(segment)) => {
            let todo_id = todo_id(request, segment)?;
            let body: Value = parse_body(request)?;
            let update = serde_json::from_value(body.clone()).map_err(|e| {
                AppError::Deserialization(format!("リクエストボディのパースエラー: {e}"))
            })?;
            Ok(Command::UpdateTodo {
                todo_id,
                request: update,
                body,
            })
        }
        ("DELETE", Route::Item(segment)) => Ok(Command::DeleteTodo {
            todo_id: todo_id(request, segment)?,
        }),
        ("POST", Route::Attachment(segment)) => Ok(Command::CreateAttachmentUploadUrl {
            todo_id: todo_id(request, segment)?,
        }),
        ("DELETE", Route::Attachment(segment)) => Ok(Command::DeleteAttachment {
            todo_id: todo_id(request, segment)?,
        }),
        _ => Err(not_found(request)),
    }
}

fn not_found(request: &ApiGatewayProxyRequest) -> AppError {
    AppError::NotFound(format!(
        "サポートされていないメソッドまたはパス: {} {}",
        request.http_method, request.path
    ))
}

/// パスを `/todos` 以下の形に分解
fn parse_route(path: &str) -> Option<Route<'_>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let position = segments.iter().rposition(|s| *s == "todos")?;

    match &segments[position + 1..] {
        [] => Some(Route::Collection),
        [id] => Some(Route::Item(*id)),
        [id, "attachment"] => Some(Route::Attachment(*id)),
        _ => None,
    }
}

/// パスパラメータの todoId を優先し、無ければパスから取り出した値を使う
fn todo_id(request: &ApiGatewayProxyRequest, path_segment: &str) -> Result<TodoId, AppError> {
    let raw = request.path_parameter("todoId").unwrap_or(path_segment);
    Ok(TodoId::from_string(raw.to_string())?)
}

fn parse_body<T: DeserializeOwned>(request: &ApiGatewayProxyRequest) -> Result<T, AppError> {
    let body = request
        .non_empty_body()
        .ok_or_else(|| AppError::Deserialization("リクエストボディが必要です".to_string()))?;

    serde_json::from_str(body)
        .map_err(|e| AppError::Deserialization(format!("リクエストボディのパースエラー: {e}")))
}

/// コマンドを実行
async fn execute_command<R, S>(
    command: Command,
    user_id: &str,
    service: &TodoService<R, S>,
) -> Result<ApiGatewayProxyResponse, AppError>
where
    R: TodoRepository,
    S: AttachmentStorage,
{
    match command {
        Command::CreateTodo(request) => {
            let item = service.create_todo(user_id, request).await?;
            Ok(success_response(201, json!({ "item": item })))
        }
        Command::UpdateTodo {
            todo_id,
            request,
            body,
        } => {
            let outcome = service.update_todo(user_id, &todo_id, request).await?;
            // item は送られたボディをそのまま返す
            Ok(success_response(
                200,
                json!({ "item": body, "uploadUrl": outcome.upload_url }),
            ))
        }
        Command::DeleteTodo { todo_id } => {
            service.delete_todo(user_id, &todo_id).await?;
            Ok(success_response(200, json!({})))
        }
        Command::CreateAttachmentUploadUrl { todo_id } => {
            let upload_url = service
                .create_attachment_upload_url(user_id, &todo_id)
                .await?;
            Ok(success_response(200, json!({ "uploadUrl": upload_url })))
        }
        Command::DeleteAttachment { todo_id } => {
            service.delete_todo_image(user_id, &todo_id).await?;
            Ok(success_response(200, json!({})))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    if let Err(e) = init_tracing() {
        eprintln!("トレーシング初期化エラー: {e}");
        // トレーシング初期化に失敗してもアプリケーションは継続
    }

    run(service_fn(function_handler)).await
}
