use application::TodoService;
use domain::{
    parse_limit, AttachmentStorage, PageCursor, PageRequest, TodoItem, TodoOrder, TodoRepository,
};
use infrastructure::{load_sdk_config, DynamoDbClient, DynamoDbTodoRepository, S3AttachmentStorage};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Serialize;
use shared::{
    error_response, extract_user_id, init_tracing, success_response,
    telemetry::trace_http_request, trace_lambda_handler, ApiGatewayProxyRequest,
    ApiGatewayProxyResponse, AppError, Config,
};
use tracing::{error, info};

/// ToDo一覧レスポンス
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TodoListResponse<'a> {
    items: &'a [TodoItem],
    next_key: Option<String>,
}

/// クエリの種類を表す列挙型
#[derive(Debug, PartialEq, Eq)]
enum Query {
    ListTodos(PageRequest),
}

/// クエリハンドラーのメイン関数
async fn function_handler(
    event: LambdaEvent<ApiGatewayProxyRequest>,
) -> Result<ApiGatewayProxyResponse, Error> {
    let (payload, context) = event.into_parts();

    trace_lambda_handler!(
        "query-handler",
        payload,
        context,
        |payload: ApiGatewayProxyRequest, _context| async move {
            info!(
                "QueryHandler開始: method={}, path={}",
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
            info!("QueryHandler完了: status={}", response.status_code);
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
        Ok(user_id) => match parse_query(request) {
            Ok(query) => execute_query(query, user_id, service).await,
            Err(e) => Err(e),
        },
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

/// パスとメソッドからクエリをパース
fn parse_query(request: &ApiGatewayProxyRequest) -> Result<Query, AppError> {
    let path = request.path.trim_end_matches('/');

    match request.http_method.as_str() {
        "GET" if path.ends_with("/todos") => {
            let page = PageRequest {
                limit: parse_limit(request.query_parameter("limit"))?,
                order: TodoOrder::parse(request.query_parameter("orderBy"))?,
                cursor: PageCursor::parse(request.query_parameter("nextKey"))?,
            };
            Ok(Query::ListTodos(page))
        }
        _ => Err(AppError::NotFound(format!(
            "{} {}",
            request.http_method, request.path
        ))),
    }
}

/// クエリを実行
async fn execute_query<R, S>(
    query: Query,
    user_id: &str,
    service: &TodoService<R, S>,
) -> Result<ApiGatewayProxyResponse, AppError>
where
    R: TodoRepository,
    S: AttachmentStorage,
{
    match query {
        Query::ListTodos(page_request) => {
            let page = service.list_todos(user_id, page_request).await?;

            let body = serde_json::to_value(TodoListResponse {
                items: &page.items,
                next_key: page.next_key.as_ref().map(PageCursor::encode),
            })
            .map_err(|e| AppError::Serialization(e.to_string()))?;

            Ok(success_response(200, body))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    if let Err(e) = init_tracing() {
        eprintln!("トレーシング初期化エラー: {e}");
    }

    run(service_fn(function_handler)).await
}
