use anyhow::{Context, Result};
use application::{ImageProcessOutcome, TodoService};
use aws_lambda_events::event::s3::S3Event;
use domain::{AttachmentStorage, TodoRepository};
use infrastructure::{load_sdk_config, DynamoDbClient, DynamoDbTodoRepository, S3AttachmentStorage};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use shared::{init_tracing, trace_lambda_handler, Config};
use tracing::{debug, error, info, warn};

/// 画像リサイズ Lambda のメイン関数
async fn function_handler(event: LambdaEvent<S3Event>) -> Result<(), Error> {
    let (payload, context) = event.into_parts();

    trace_lambda_handler!(
        "image-resizer",
        payload,
        context,
        |payload: S3Event, _context| async move {
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

            // 失敗を返すと S3 が非同期に再試行する
            process_event(&service, payload)
                .await
                .map(|_| ())
                .map_err(|e| Error::from(format!("{e:#}")))
        }
    )
}

/// イベント内のレコードを順に処理する。最初の失敗で打ち切る。
async fn process_event<R, S>(
    service: &TodoService<R, S>,
    event: S3Event,
) -> Result<Vec<ImageProcessOutcome>>
where
    R: TodoRepository,
    S: AttachmentStorage,
{
    info!("S3イベント処理開始: {} レコード", event.records.len());

    let mut outcomes = Vec::with_capacity(event.records.len());
    for record in event.records {
        let Some(raw_key) = record.s3.object.key.as_deref() else {
            warn!("オブジェクトキーのないレコードをスキップ");
            continue;
        };
        let key = decode_object_key(raw_key)?;
        debug!(
            "レコード処理: bucket={:?}, key={}",
            record.s3.bucket.name, key
        );

        let outcome = service
            .process_uploaded_image(&key)
            .await
            .with_context(|| format!("アップロード画像の処理に失敗: key={key}"))?;
        outcomes.push(outcome);
    }

    info!("S3イベント処理完了: {} 件", outcomes.len());
    Ok(outcomes)
}

/// イベント通知のキーは `+` が空白、その他はパーセントエンコードされている
fn decode_object_key(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    let decoded = urlencoding::decode(&spaced)
        .with_context(|| format!("オブジェクトキーのデコードに失敗: {raw}"))?;
    Ok(decoded.into_owned())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    if let Err(e) = init_tracing() {
        eprintln!("トレーシング初期化エラー: {e}");
    }

    run(service_fn(function_handler)).await
}
