/// Run every request on a fixed-width worker pool and hand back the results.
/// The order of the result is deterministic / matches the input.
pub fn parallelize<I, O, F>(workers: usize, requests: Vec<I>, cb: F) -> Vec<O>
where
    I: Send,
    O: Send,
    F: Fn(I) -> O + Send + Sync,
{
    let cb = &cb;
    scoped_threadpool::Pool::new(workers.max(1) as u32).scoped(|scope| {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut results: Vec<Option<O>> = std::iter::repeat_with(|| None)
            .take(requests.len())
            .collect();
        for (idx, req) in requests.into_iter().enumerate() {
            let tx = tx.clone();
            scope.execute(move || {
                tx.send((idx, cb(req))).unwrap();
            });
        }
        drop(tx);

        for (idx, result) in rx.iter() {
            results[idx] = Some(result);
        }
        results.into_iter().map(|x| x.unwrap()).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_order() {
        let out = parallelize(4, (0..100).collect(), |i| i * 2);
        assert_eq!(out, (0..100).map(|i| i * 2).collect::<Vec<_>>());
    }
}
