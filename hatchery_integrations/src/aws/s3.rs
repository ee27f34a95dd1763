//! S3-backed `ObjectSource`: streams object bodies without buffering them.

#[cfg(feature = "aws")]
pub use real::S3ObjectSource;

#[cfg(feature = "aws")]
mod real {
    use async_trait::async_trait;
    use aws_sdk_s3::Client;
    use aws_sdk_s3::error::DisplayErrorContext;
    use hatchery_core::storage::{BytesStream, ObjectSource};
    use hatchery_core::{Error, Result};

    #[derive(Clone)]
    pub struct S3ObjectSource {
        client: Client,
    }

    impl S3ObjectSource {
        pub fn new(client: Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl ObjectSource for S3ObjectSource {
        #[tracing::instrument(level = "debug", skip(self))]
        async fn get(&self, bucket: &str, key: &str) -> Result<BytesStream> {
            let context = format!("s3 get_object s3://{bucket}/{key}");
            let resp = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| Error::transport(context.clone(), DisplayErrorContext(e)))?;

            let stream = futures_util::stream::unfold(
                (resp.body, context),
                |(mut body, context)| async move {
                    match body.next().await {
                        Some(Ok(chunk)) => Some((Ok(chunk), (body, context))),
                        Some(Err(e)) => Some((Err(Error::transport(context.clone(), e)), (body, context))),
                        None => None,
                    }
                },
            );
            Ok(Box::pin(stream))
        }
    }
}
