use crate::error::ViewError;
use crate::format::Row;
use std::future::Future;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

pub async fn fan_out<T, F, Fut>(
    entities: Vec<(String, T)>,
    deadline: Instant,
    work: F,
) -> Result<Vec<Row>, ViewError>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<Row, ViewError>> + Send + 'static,
{
    let mut slots: Vec<Option<Row>> = vec![None; entities.len()];
    let mut tasks = JoinSet::new();

    for (index, (key, entity)) in entities.into_iter().enumerate() {
        let job = work(entity);
        tasks.spawn(async move {
            if Instant::now() >= deadline {
                return (index, key, Err(ViewError::Timeout));
            }
            (index, key, job.await)
        });
    }

    loop {
        let joined = match timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(joined)) => joined?,
            Ok(None) => break,
            Err(_) => {
                debug!(pending = tasks.len(), "deadline reached, aborting workers");
                return Err(ViewError::Timeout);
            }
        };

        let (index, key, result) = joined;
        match result {
            Ok(row) => slots[index] = Some(row),
            Err(error) => {
                debug!(%key, %error, "worker failed, aborting the rest");
                return Err(error);
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::fan_out;
    use crate::error::ViewError;
    use crate::format::Row;
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    fn entities(delays: &[(&str, u64)]) -> Vec<(String, (String, u64))> {
        delays
            .iter()
            .map(|(key, delay)| (key.to_string(), (key.to_string(), *delay)))
            .collect()
    }

    async fn delayed_row((key, delay): (String, u64)) -> Result<Row, ViewError> {
        sleep(Duration::from_millis(delay)).await;
        Ok(vec![key])
    }

    #[tokio::test]
    async fn rows_follow_input_order_not_completion_order() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let rows = fan_out(
            entities(&[("A", 60), ("B", 0), ("C", 30)]),
            deadline,
            delayed_row,
        )
        .await
        .unwrap();

        assert_eq!(rows, vec![vec!["A"], vec!["B"], vec!["C"]]);
    }

    #[tokio::test]
    async fn one_failure_discards_every_row() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let result = fan_out(
            entities(&[("A", 0), ("B", 10), ("C", 0)]),
            deadline,
            |(key, delay): (String, u64)| async move {
                sleep(Duration::from_millis(delay)).await;
                if key == "B" {
                    return Err(ViewError::MetricsApiUnavailable);
                }
                Ok(vec![key])
            },
        )
        .await;

        assert!(matches!(result, Err(ViewError::MetricsApiUnavailable)));
    }

    #[tokio::test]
    async fn earliest_failure_by_completion_wins() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let result = fan_out(
            entities(&[("A", 30), ("B", 10), ("C", 0)]),
            deadline,
            |(key, delay): (String, u64)| async move {
                sleep(Duration::from_millis(delay)).await;
                match key.as_str() {
                    "B" => Err(ViewError::InvalidSortKey(key)),
                    "C" => Err(ViewError::MetricsApiUnavailable),
                    _ => Ok(vec![key]),
                }
            },
        )
        .await;

        assert!(matches!(result, Err(ViewError::MetricsApiUnavailable)));
    }

    #[tokio::test]
    async fn slow_workers_hit_the_deadline() {
        let deadline = Instant::now() + Duration::from_millis(30);
        let result = fan_out(entities(&[("A", 0), ("B", 10_000)]), deadline, delayed_row).await;

        assert!(result.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn expired_deadline_skips_the_work() {
        let deadline = Instant::now();
        sleep(Duration::from_millis(5)).await;
        let result = fan_out(entities(&[("A", 0)]), deadline, delayed_row).await;

        assert!(result.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn no_entities_yield_no_rows() {
        let rows = fan_out(Vec::<(String, (String, u64))>::new(), Instant::now(), delayed_row)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
