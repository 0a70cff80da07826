use std::path::Path;

use tracing::{debug, info};

use crate::assembly::exemplar::{format_exemplar, ExemplarDoc};
use crate::assembly::AssemblyError;
use crate::embedding::{cosine_similarity, similarity_matrix, EmbeddingInput, EmbeddingProvider};
use crate::retrieval::{FlushPolicy, NeighborRanker, NeighborStore, RetrievalCache};
use crate::types::{CacheKey, Dataset, FieldNames};

/// The candidate picked by consensus reranking.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusChoice<'a> {
    pub index: usize,
    pub text: &'a str,
    /// Row sum of similarities to every candidate, itself included.
    pub score: f32,
}

/// Builds few-shot exemplars from ranked neighbors.
///
/// The neighbor store is injected: a [`RetrievalCache`] for persisted
/// rankings, or an in-memory store when nothing should touch disk.
pub struct ContextAssembler<E, D, S> {
    ranker: NeighborRanker<E>,
    dataset: D,
    store: S,
}

impl<E, D> ContextAssembler<E, D, RetrievalCache>
where
    E: EmbeddingProvider,
    D: Dataset,
{
    /// Assembler backed by the on-disk cache for `(dataset.tag(), embedder.model_name())`.
    pub fn with_cache(
        embedder: E,
        dataset: D,
        storage_root: &Path,
        policy: FlushPolicy,
    ) -> Result<Self, AssemblyError> {
        let key = CacheKey::new(dataset.tag(), embedder.model_name());
        let store = RetrievalCache::open(storage_root, &key, policy)?;
        Ok(Self::new(embedder, dataset, store))
    }
}

impl<E, D, S> ContextAssembler<E, D, S>
where
    E: EmbeddingProvider,
    D: Dataset,
    S: NeighborStore,
{
    pub fn new(embedder: E, dataset: D, store: S) -> Self {
        Self {
            ranker: NeighborRanker::new(embedder),
            dataset,
            store,
        }
    }

    pub fn ranker(&self) -> &NeighborRanker<E> {
        &self.ranker
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Top-`k` exemplars per query from that query's own documents.
    ///
    /// Rankings are read from the store by query position and computed (then
    /// appended) only on a miss. With `k == 0` nothing is ranked and every
    /// query gets an empty exemplar list, which joins to the empty string
    /// (not `vec![""]`).
    pub fn get_context<Q, T>(
        &mut self,
        queries: &[Q],
        retr_texts: &[Vec<T>],
        retr_gts: &[Vec<T>],
        k: usize,
    ) -> Result<Vec<Vec<String>>, AssemblyError>
    where
        Q: AsRef<str>,
        T: AsRef<str>,
    {
        assemble(
            &self.ranker,
            &self.dataset,
            &mut self.store,
            queries,
            retr_texts,
            retr_gts,
            k,
        )
    }

    /// [`get_context`](Self::get_context) over the dataset's own retrieval data.
    pub fn get_dataset_context(&mut self, k: usize) -> Result<Vec<Vec<String>>, AssemblyError> {
        let data = self.dataset.retrieval_data();
        assemble(
            &self.ranker,
            &self.dataset,
            &mut self.store,
            &data.queries,
            &data.texts,
            &data.ground_truths,
            k,
        )
    }

    /// Contrastive few-shot blocks.
    ///
    /// Queries are ranked against the other queries; the `num_ce` least
    /// similar subjects become exemplar sources, in ranking order. Each source
    /// contributes up to `ce_k` of its own documents, clamped to what it has.
    /// Output nesting is query → exemplar subject → exemplar strings.
    pub fn contrastive_retrieval<Q, T>(
        &self,
        queries: &[Q],
        retr_texts: &[Vec<T>],
        retr_gts: &[Vec<T>],
        num_ce: usize,
        ce_k: usize,
    ) -> Result<Vec<Vec<Vec<String>>>, AssemblyError>
    where
        Q: AsRef<str>,
        T: AsRef<str>,
    {
        check_len("queries and retrieval texts", queries.len(), retr_texts.len())?;
        check_len("queries and ground truths", queries.len(), retr_gts.len())?;
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let fields = self.dataset.field_names();
        let vectors = self.ranker.encode(EmbeddingInput::texts(queries))?;

        let mut all_blocks = Vec::with_capacity(queries.len());
        for i in 0..queries.len() {
            let ranking = self.ranker.rank(
                EmbeddingInput::Vectors(&vectors[i..=i]),
                EmbeddingInput::Vectors(&vectors[..]),
            )?;
            let sorted = &ranking.sorted_indices;
            let subjects = &sorted[sorted.len().saturating_sub(num_ce)..];

            let mut blocks = Vec::with_capacity(subjects.len());
            for &subject in subjects {
                let texts = &retr_texts[subject];
                let gts = &retr_gts[subject];
                check_len("subject texts and ground truths", texts.len(), gts.len())?;
                let ratings = subject_ratings(&self.dataset, fields, subject);

                let take = ce_k.min(texts.len());
                let mut block = Vec::with_capacity(take);
                for j in 0..take {
                    let doc = ExemplarDoc {
                        text: texts[j].as_ref(),
                        ground_truth: Some(gts[j].as_ref()),
                        rating: rating_at(ratings, subject, j, fields)?,
                    };
                    block.push(format_exemplar(fields, doc));
                }
                blocks.push(block);
            }
            all_blocks.push(blocks);
        }

        Ok(all_blocks)
    }

    /// Pick the output most similar, in aggregate, to all outputs.
    ///
    /// Ties go to the first index reaching the maximum.
    pub fn semantic_consensus_weighting<'a, T>(&self, outputs: &'a [T]) -> Result<ConsensusChoice<'a>, AssemblyError>
    where
        T: AsRef<str>,
    {
        if outputs.is_empty() {
            return Err(AssemblyError::EmptyCandidates);
        }

        let embeds = self.ranker.encode(EmbeddingInput::texts(outputs))?;
        let matrix = similarity_matrix(self.ranker.embedder(), &embeds, &embeds);

        let mut best = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (index, row) in matrix.iter().enumerate() {
            let score: f32 = row.iter().sum();
            if score > best_score {
                best = index;
                best_score = score;
            }
        }

        debug!(candidates = outputs.len(), chosen = best, score = best_score, "Consensus candidate chosen");

        Ok(ConsensusChoice {
            index: best,
            text: outputs[best].as_ref(),
            score: best_score,
        })
    }

    /// `1 - cosine similarity` for each aligned pair.
    pub fn calculate_one_to_one_distances<T>(&self, texts_a: &[T], texts_b: &[T]) -> Result<Vec<f32>, AssemblyError>
    where
        T: AsRef<str>,
    {
        check_len("paired texts", texts_a.len(), texts_b.len())?;

        let embeds_a = self.ranker.encode(EmbeddingInput::texts(texts_a))?;
        let embeds_b = self.ranker.encode(EmbeddingInput::texts(texts_b))?;

        Ok(embeds_a
            .iter()
            .zip(embeds_b.iter())
            .map(|(a, b)| 1.0 - cosine_similarity(a, b))
            .collect())
    }
}

fn assemble<E, D, S, Q, T>(
    ranker: &NeighborRanker<E>,
    dataset: &D,
    store: &mut S,
    queries: &[Q],
    retr_texts: &[Vec<T>],
    retr_gts: &[Vec<T>],
    k: usize,
) -> Result<Vec<Vec<String>>, AssemblyError>
where
    E: EmbeddingProvider,
    D: Dataset,
    S: NeighborStore,
    Q: AsRef<str>,
    T: AsRef<str>,
{
    if k == 0 {
        return Ok(vec![Vec::new(); queries.len()]);
    }

    check_len("queries and retrieval texts", queries.len(), retr_texts.len())?;
    check_len("queries and ground truths", queries.len(), retr_gts.len())?;

    let fields = dataset.field_names();
    let mut appended = 0usize;
    let mut all_examples = Vec::with_capacity(queries.len());

    for (i, query) in queries.iter().enumerate() {
        let texts = &retr_texts[i];
        let gts = &retr_gts[i];
        check_len("subject texts and ground truths", texts.len(), gts.len())?;

        if store.get(i).is_none() {
            let ranking = ranker.rank_texts(query.as_ref(), texts)?;
            store.append(ranking.sorted_indices)?;
            appended += 1;
        }
        // A positional store holds every earlier position by now.
        let Some(sorted) = store.get(i) else {
            return Err(AssemblyError::StaleCache {
                position: i,
                index: i,
                available: store.len(),
            });
        };

        let ratings = subject_ratings(dataset, fields, i);
        let mut examples = Vec::with_capacity(k.min(sorted.len()));
        for &doc_id in sorted.iter().take(k) {
            if doc_id >= texts.len() {
                return Err(AssemblyError::StaleCache {
                    position: i,
                    index: doc_id,
                    available: texts.len(),
                });
            }
            let text = texts[doc_id].as_ref();
            let gt = gts[doc_id].as_ref();
            let doc = if text != gt {
                ExemplarDoc {
                    text,
                    ground_truth: Some(gt),
                    rating: rating_at(ratings, i, doc_id, fields)?,
                }
            } else {
                ExemplarDoc {
                    text,
                    ground_truth: None,
                    rating: None,
                }
            };
            examples.push(format_exemplar(fields, doc));
        }
        all_examples.push(examples);
    }

    if appended > 0 {
        store.flush()?;
        info!(computed = appended, queries = queries.len(), "Retrieval rankings computed and cached");
    }

    Ok(all_examples)
}

fn check_len(what: &'static str, left: usize, right: usize) -> Result<(), AssemblyError> {
    if left != right {
        return Err(AssemblyError::LengthMismatch { what, left, right });
    }
    Ok(())
}

fn subject_ratings<'d, D: Dataset>(dataset: &'d D, fields: &FieldNames, subject: usize) -> Option<&'d [String]> {
    if fields.is_rated() {
        dataset.ratings(subject)
    } else {
        None
    }
}

fn rating_at<'r>(
    ratings: Option<&'r [String]>,
    subject: usize,
    document: usize,
    fields: &FieldNames,
) -> Result<Option<&'r str>, AssemblyError> {
    if !fields.is_rated() {
        return Ok(None);
    }
    ratings
        .and_then(|r| r.get(document))
        .map(|r| Some(r.as_str()))
        .ok_or(AssemblyError::MissingRating { subject, document })
}
