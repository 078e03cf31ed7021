use std::collections::VecDeque;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::error::ProtoError;
use super::guarded;
use super::oid::ObjectId;
use super::transport::Session;
use super::value::SnmpValue;

/// Ленивый обход поддерева в одной сессии.
///
/// Страницы GETBULK запрашиваются только когда закончились буферизованные
/// строки, поэтому ранняя остановка не тянет остаток таблицы. Обход конечен и
/// не перезапускается: после ошибки или выхода из поддерева всегда `None`.
/// Drop закрывает сессию.
pub struct Walk<S> {
    session: Option<S>,
    root: ObjectId,
    cursor: ObjectId,
    buffer: VecDeque<(ObjectId, SnmpValue)>,
    max_repetitions: u32,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<S: Session> Walk<S> {
    pub(crate) fn new(
        session: S,
        root: ObjectId,
        max_repetitions: u32,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session: Some(session),
            cursor: root.clone(),
            root,
            buffer: VecDeque::new(),
            max_repetitions: max_repetitions.max(1),
            timeout,
            cancel,
        }
    }

    pub fn root(&self) -> &ObjectId {
        &self.root
    }

    /// Больше страниц запрашиваться не будет (сессия уже освобождена).
    pub fn is_exhausted(&self) -> bool {
        self.session.is_none()
    }

    /// Следующая строка поддерева, `None` в конце.
    pub async fn next(&mut self) -> Option<Result<(ObjectId, SnmpValue), ProtoError>> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Some(Ok(row));
            }

            let session = self.session.as_mut()?;
            let page = guarded(
                self.timeout,
                &self.cancel,
                session.get_bulk(&self.cursor, self.max_repetitions),
            )
            .await;

            let rows = match page {
                Ok(rows) => rows,
                Err(e) => {
                    self.session = None;
                    return Some(Err(e));
                }
            };

            let mut left_subtree = rows.is_empty();
            for (oid, value) in rows {
                // Невозрастающие OID у сломанного агента дали бы бесконечный цикл.
                if !oid.starts_with(&self.root) || oid <= self.cursor {
                    left_subtree = true;
                    break;
                }
                self.cursor = oid.clone();
                self.buffer.push_back((oid, value));
            }

            if left_subtree {
                self.session = None;
            }
        }
    }

    /// Перебирает строки до первого `Some` от `f`, дальше страницы не запрашивает.
    pub async fn find_map<R>(
        &mut self,
        mut f: impl FnMut(&ObjectId, &SnmpValue) -> Option<R>,
    ) -> Result<Option<R>, ProtoError> {
        while let Some(row) = self.next().await {
            let (oid, value) = row?;
            if let Some(found) = f(&oid, &value) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Вычитывает оставшиеся строки. Только для небольших таблиц.
    pub async fn collect(mut self) -> Result<Vec<(ObjectId, SnmpValue)>, ProtoError> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await {
            rows.push(row?);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::snmp::error::{ErrorStatus, TransportError};

    type Page = Result<Vec<(ObjectId, SnmpValue)>, ProtoError>;

    /// Отдаёт заготовленные страницы GETBULK, потом пустую.
    struct PagedSession {
        pages: VecDeque<Page>,
        requests: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Session for PagedSession {
        async fn get(&mut self, _oid: &ObjectId) -> Result<SnmpValue, ProtoError> {
            Err(ProtoError::protocol(ErrorStatus::GenErr, 1))
        }

        async fn get_bulk(&mut self, _oid: &ObjectId, _max_repetitions: u32) -> Page {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.pages.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    const ROOT: &str = "1.3.6.1.2.1.2.2.1.2";

    fn row(oid: &str, value: i64) -> (ObjectId, SnmpValue) {
        (oid.parse().unwrap(), SnmpValue::Integer(value))
    }

    fn walk(pages: Vec<Page>) -> (Walk<PagedSession>, Arc<AtomicUsize>) {
        let requests = Arc::new(AtomicUsize::new(0));
        let session = PagedSession {
            pages: pages.into(),
            requests: Arc::clone(&requests),
        };
        let walk = Walk::new(
            session,
            ROOT.parse().unwrap(),
            2,
            Duration::from_secs(1),
            CancellationToken::new(),
        );
        (walk, requests)
    }

    #[tokio::test]
    async fn test_walk_stops_on_non_increasing_oid() {
        let (walk, requests) = walk(vec![
            Ok(vec![row("1.3.6.1.2.1.2.2.1.2.1", 1), row("1.3.6.1.2.1.2.2.1.2.2", 2)]),
            // Агент возвращается к уже пройденному OID.
            Ok(vec![row("1.3.6.1.2.1.2.2.1.2.2", 2), row("1.3.6.1.2.1.2.2.1.2.3", 3)]),
            Ok(vec![row("1.3.6.1.2.1.2.2.1.2.4", 4)]),
        ]);

        let rows = walk.collect().await.unwrap();

        assert_eq!(rows, [row("1.3.6.1.2.1.2.2.1.2.1", 1), row("1.3.6.1.2.1.2.2.1.2.2", 2)]);
        assert_eq!(requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_walk_stops_outside_subtree() {
        let (mut walk, requests) = walk(vec![Ok(vec![
            row("1.3.6.1.2.1.2.2.1.2.1", 1),
            row("1.3.6.1.2.1.2.2.1.3.1", 6),
        ])]);

        assert_eq!(walk.next().await, Some(Ok(row("1.3.6.1.2.1.2.2.1.2.1", 1))));
        assert!(walk.is_exhausted());
        assert_eq!(walk.next().await, None);
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_walk_is_fused_after_error() {
        let timeout = ProtoError::from(TransportError::Timeout(Duration::from_secs(1)));
        let (mut walk, requests) = walk(vec![
            Ok(vec![row("1.3.6.1.2.1.2.2.1.2.1", 1)]),
            Err(timeout.clone()),
            Ok(vec![row("1.3.6.1.2.1.2.2.1.2.2", 2)]),
        ]);

        assert_eq!(walk.next().await, Some(Ok(row("1.3.6.1.2.1.2.2.1.2.1", 1))));
        assert_eq!(walk.next().await, Some(Err(timeout)));
        assert!(walk.is_exhausted());
        assert_eq!(walk.next().await, None);
        assert_eq!(walk.next().await, None);
        assert_eq!(requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_find_map_stops_fetching() {
        let (mut walk, requests) = walk(vec![
            Ok(vec![row("1.3.6.1.2.1.2.2.1.2.1", 1), row("1.3.6.1.2.1.2.2.1.2.2", 2)]),
            Ok(vec![row("1.3.6.1.2.1.2.2.1.2.3", 3)]),
        ]);

        let found = walk
            .find_map(|oid, _| (oid.arcs().last() == Some(&2)).then(|| oid.to_string()))
            .await
            .unwrap();

        assert_eq!(found.as_deref(), Some("1.3.6.1.2.1.2.2.1.2.2"));
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }
}
