use std::fmt::Display;
use std::future::Future;

use crate::errors::AppError;

/// Outcome of running a batch where no item may cancel the others.
#[derive(Debug)]
pub struct Settled<K, T> {
    pub succeeded: Vec<(K, T)>,
    pub failed: Vec<(K, AppError)>,
}

impl<K, T> Settled<K, T> {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Runs `f` over every item, one at a time, collecting successes and failures separately.
///
/// Items are awaited sequentially in input order. A failing item is logged and
/// recorded; it never stops the remaining items.
pub async fn settle_all<I, K, F, Fut, T>(items: I, mut f: F) -> Settled<K, T>
where
    I: IntoIterator<Item = K>,
    K: Clone + Display,
    F: FnMut(K) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut settled = Settled {
        succeeded: Vec::new(),
        failed: Vec::new(),
    };

    for item in items {
        match f(item.clone()).await {
            Ok(value) => settled.succeeded.push((item, value)),
            Err(e) => {
                tracing::warn!("{} failed: {}", item, e);
                settled.failed.push((item, e));
            }
        }
    }

    settled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failures_do_not_cancel_siblings() {
        let settled = settle_all(vec![1, 2, 3, 4], |n| async move {
            if n == 2 {
                Err(AppError::UpstreamUnavailable(format!("item {}", n)))
            } else {
                Ok(n * 10)
            }
        })
        .await;

        assert_eq!(settled.total(), 4);
        assert!(!settled.is_clean());
        assert_eq!(
            settled.succeeded.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
            vec![10, 30, 40]
        );
        assert_eq!(settled.failed.len(), 1);
        assert_eq!(settled.failed[0].0, 2);
    }

    #[tokio::test]
    async fn items_run_in_order() {
        let mut seen = Vec::new();
        let settled = settle_all(vec!["a", "b", "c"], |s| {
            seen.push(s);
            async move { Ok::<_, AppError>(s.len()) }
        })
        .await;

        assert!(settled.is_clean());
        assert_eq!(seen, vec!["a", "b", "c"]);
    }
}
