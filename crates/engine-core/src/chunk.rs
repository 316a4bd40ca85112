use crate::paginate::PageStream;
use futures::{StreamExt, TryStreamExt, stream};
use tracing::info;

/// Splits `items` into consecutive groups of at most `size`, preserving order.
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

/// Runs one page stream per chunk, in chunk order, and concatenates them.
///
/// A chunk whose stream ends in an error does not stop the chunks after it.
/// Pages without a label of their own are labelled `chunk i/n`.
pub fn paginate_chunks<'a, T, M>(chunks: Vec<Vec<T>>, mut make: M) -> PageStream<'a>
where
    T: Send + 'a,
    M: FnMut(Vec<T>) -> PageStream<'a> + Send + 'a,
{
    let total = chunks.len();
    stream::iter(chunks.into_iter().enumerate())
        .map(move |(index, items)| {
            let label = format!("chunk {}/{}", index + 1, total);
            info!(chunk = %label, size = items.len(), "Fetching chunk");
            make(items)
                .map_ok(move |page| match page.label {
                    Some(_) => page,
                    None => page.with_label(label.clone()),
                })
                .boxed()
        })
        .flatten()
        .boxed()
}
