use anyhow::{anyhow, Context};
use arrow_array::cast::AsArray;
use arrow_array::types::{Float32Type, Int64Type};
use arrow_array::{Array, FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

use rag_core::config::Settings;
use rag_core::corpus::seed_documents;
use rag_core::error::{Error, Result};
use rag_core::traits::{DocumentStore, Embedder};
use rag_core::types::{Category, DocId, DocMetadata, KnowledgeDocument, NewDocument, QueryResult};

use crate::schema::{build_documents_schema, vector_dim};
use crate::table::{ensure_table, get_meta, open_db, set_meta, table_exists};

const EMBEDDER_KEY: &str = "embedder_id";
const INSERT_BATCH: usize = 256;
/// Extra rows fetched past `k` so that ties at the cut are settled by insertion order.
const TIE_SLACK: usize = 16;

/// Persistent knowledge store on LanceDB. Every row carries the embedding of its content,
/// computed once at insertion.
///
/// The API is blocking: calls drive a private Tokio runtime and must not be made from
/// inside another runtime's async context.
pub struct LanceStore {
	rt: Runtime,
	db: Connection,
	table: Table,
	meta_table: String,
	embedder: Arc<dyn Embedder>,
	timeout: Duration,
	write_lock: Mutex<()>,
}

impl LanceStore {
	/// Open (or create) the store under `store.persist_dir`. Refuses a table whose vectors
	/// were built by a different embedder.
	pub fn open(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Self> {
		let rt = tokio::runtime::Builder::new_multi_thread().worker_threads(2).enable_all().build().map_err(Error::store)?;
		let dir = settings.store.persist_path();
		std::fs::create_dir_all(&dir).map_err(|e| Error::store(format!("{}: {}", dir.display(), e)))?;
		let uri = dir.to_string_lossy().to_string();
		let table_name = settings.store.table.clone();
		let meta_table = format!("{}_meta", table_name);
		let dim = i32::try_from(embedder.dim()).map_err(Error::store)?;
		let embedder_id = embedder.id().to_string();

		let (db, table) = rt
			.block_on(async {
				let db = open_db(&uri).await?;
				if let Some(built_with) = get_meta(&db, &meta_table, EMBEDDER_KEY).await? {
					if built_with != embedder_id {
						return Err(anyhow!("table '{}' was built with embedder '{}', current embedder is '{}'", table_name, built_with, embedder_id));
					}
				}
				if table_exists(&db, &table_name).await? {
					let existing = db.open_table(&table_name).execute().await?;
					let found = vector_dim(&existing.schema().await?);
					if found != Some(dim) { return Err(anyhow!("table '{}' stores vectors of dim {:?}, embedder produces {}", table_name, found, dim)); }
				} else {
					ensure_table(&db, &table_name, build_documents_schema(dim)).await?;
				}
				set_meta(&db, &meta_table, EMBEDDER_KEY, &embedder_id).await?;
				let table = db.open_table(&table_name).execute().await?;
				Ok::<_, anyhow::Error>((db, table))
			})
			.map_err(Error::store)?;
		tracing::info!("Opened LanceDB store at {} (table '{}', embedder {})", uri, settings.store.table, embedder.id());
		Ok(Self { rt, db, table, meta_table, embedder, timeout: settings.retrieval.timeout(), write_lock: Mutex::new(()) })
	}

	pub fn count(&self) -> Result<usize> {
		self.rt.block_on(self.table.count_rows(None)).map_err(Error::retrieval)
	}

	/// Embedder id recorded in the meta table.
	pub fn recorded_embedder(&self) -> Result<Option<String>> {
		self.rt.block_on(get_meta(&self.db, &self.meta_table, EMBEDDER_KEY)).map_err(Error::retrieval)
	}

	/// Top-`k` documents by cosine similarity to `query`, best first. Embedding the query and
	/// the vector search share the configured time budget.
	pub fn search(&self, query: &str, k: usize, category: Option<Category>) -> Result<Vec<QueryResult>> {
		if k == 0 { return Ok(vec![]); }
		let start = Instant::now();
		let budget = self.timeout;
		let embedder = Arc::clone(&self.embedder);
		let text = query.to_string();
		let query_vec = self.rt.block_on(async move {
			let job = tokio::task::spawn_blocking(move || embedder.embed_batch(&[text]));
			match tokio::time::timeout(budget, job).await {
				Err(_) => Err(Error::ScorerTimeout(budget)),
				Ok(Err(join)) => Err(Error::retrieval(join)),
				Ok(Ok(res)) => res.map_err(Error::retrieval).and_then(|mut v| v.pop().ok_or_else(|| Error::retrieval("embedder returned no vector"))),
			}
		})?;

		if query_vec.iter().all(|x| *x == 0.0) {
			// No direction to rank by: every document is equally (un)related.
			tracing::debug!("Degenerate query vector for {:?}, returning first {} documents", query, k);
			let docs = self.scan()?;
			return Ok(docs
				.into_iter()
				.filter(|(_, d)| category.map_or(true, |c| d.metadata.category == c))
				.take(k)
				.map(|(_, d)| QueryResult { document: Arc::new(d), score: 0.0 })
				.collect());
		}

		let remaining = budget.saturating_sub(start.elapsed());
		let table = self.table.clone();
		let mut hits = self.rt.block_on(async move {
			let search = async {
				let mut q = table.vector_search(query_vec)?.column("vector").distance_type(DistanceType::Cosine).limit(k + TIE_SLACK);
				if let Some(c) = category { q = q.only_if(format!("category = '{}'", c.as_str())); }
				let batches: Vec<RecordBatch> = q.execute().await?.try_collect().await?;
				let mut hits = Vec::new();
				for batch in &batches { hits.extend(decode_hits(batch)?); }
				Ok::<_, anyhow::Error>(hits)
			};
			match tokio::time::timeout(remaining, search).await {
				Err(_) => Err(Error::ScorerTimeout(budget)),
				Ok(res) => res.map_err(Error::retrieval),
			}
		})?;
		// Ties wider than the slack are still cut by LanceDB, in its own order.
		hits.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));
		hits.truncate(k);
		tracing::debug!("Vector search {:?} -> {} hits in {:?}", query, hits.len(), start.elapsed());
		Ok(hits.into_iter().map(|(_, doc, score)| QueryResult { document: Arc::new(doc), score }).collect())
	}

	fn scan(&self) -> Result<Vec<(i64, KnowledgeDocument)>> {
		let table = self.table.clone();
		let mut docs = self
			.rt
			.block_on(async move {
				let total = table.count_rows(None).await?;
				if total == 0 { return Ok(vec![]); }
				let batches: Vec<RecordBatch> = table.query().limit(total).execute().await?.try_collect().await?;
				let mut docs = Vec::with_capacity(total);
				for batch in &batches { docs.extend(decode_documents(batch)?); }
				Ok::<_, anyhow::Error>(docs)
			})
			.map_err(Error::retrieval)?;
		docs.sort_by_key(|(seq, _)| *seq);
		Ok(docs)
	}

	fn insert(&self, first_seq: usize, docs: &[KnowledgeDocument]) -> anyhow::Result<()> {
		let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
		let vectors = self.embedder.embed_batch(&texts)?;
		if vectors.len() != docs.len() { return Err(anyhow!("embedder returned {} vectors for {} documents", vectors.len(), docs.len())); }
		let batch = self.to_record_batch(first_seq, docs, vectors)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		self.rt.block_on(self.table.add(reader).execute())?;
		Ok(())
	}

	fn to_record_batch(&self, first_seq: usize, docs: &[KnowledgeDocument], vectors: Vec<Vec<f32>>) -> anyhow::Result<RecordBatch> {
		let dim = i32::try_from(self.embedder.dim())?;
		let now = Utc::now().timestamp_millis();
		let mut extras = Vec::with_capacity(docs.len());
		for d in docs { extras.push(if d.metadata.extra.is_empty() { None } else { Some(serde_json::to_string(&d.metadata.extra)?) }); }
		let seqs: Vec<i64> = (0..docs.len()).map(|i| (first_seq + i) as i64).collect();
		let vectors = vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect::<Vec<_>>()));
		Ok(RecordBatch::try_new(build_documents_schema(dim), vec![
			Arc::new(StringArray::from_iter_values(docs.iter().map(|d| d.id.as_str()))),
			Arc::new(Int64Array::from(seqs)),
			Arc::new(StringArray::from_iter_values(docs.iter().map(|d| d.content.as_str()))),
			Arc::new(StringArray::from_iter_values(docs.iter().map(|d| d.metadata.category.as_str()))),
			Arc::new(StringArray::from_iter_values(docs.iter().map(|d| d.metadata.topic.as_str()))),
			Arc::new(StringArray::from_iter_values(docs.iter().map(|d| d.metadata.severity.as_str()))),
			Arc::new(StringArray::from_iter_values(docs.iter().map(|d| d.metadata.source.as_str()))),
			Arc::new(StringArray::from(extras)),
			Arc::new(TimestampMillisecondArray::from(vec![now; docs.len()])),
			Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
		])?)
	}
}

impl DocumentStore for LanceStore {
	fn initialize(&self) -> Result<()> {
		let _guard = self.write_lock.lock().map_err(Error::store)?;
		let existing = self.rt.block_on(self.table.count_rows(None)).map_err(Error::store)?;
		if existing > 0 { tracing::info!("LanceDB store holds {} documents, skipping seed", existing); return Ok(()); }
		let seed = seed_documents()?;
		tracing::info!("Seeding LanceDB store with {} documents", seed.len());
		let pb = ProgressBar::new(seed.len() as u64);
		if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents {msg}") { pb.set_style(style.progress_chars("#>-")); }
		for (i, chunk) in seed.chunks(INSERT_BATCH).enumerate() {
			self.insert(i * INSERT_BATCH, chunk).map_err(Error::store)?;
			pb.inc(chunk.len() as u64);
		}
		pb.finish_with_message("seeded");
		Ok(())
	}

	fn add(&self, doc: NewDocument) -> Result<DocId> {
		let _guard = self.write_lock.lock().map_err(Error::store)?;
		let count = self.rt.block_on(self.table.count_rows(None)).map_err(Error::store)?;
		let id = DocId::custom(count + 1, &doc.content);
		let stored = doc.with_id(id.clone());
		self.insert(count, std::slice::from_ref(&stored)).map_err(Error::store)?;
		tracing::info!("Added document {} ({}/{})", id, stored.metadata.category, stored.metadata.topic);
		Ok(id)
	}

	fn all(&self) -> Result<Vec<Arc<KnowledgeDocument>>> {
		Ok(self.scan()?.into_iter().map(|(_, d)| Arc::new(d)).collect())
	}
}

fn str_col<'a>(batch: &'a RecordBatch, name: &str) -> anyhow::Result<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("column '{}' missing or not utf8", name))
}

fn decode_documents(batch: &RecordBatch) -> anyhow::Result<Vec<(i64, KnowledgeDocument)>> {
	let ids = str_col(batch, "id")?;
	let seqs = batch.column_by_name("seq").context("column 'seq' missing")?.as_primitive_opt::<Int64Type>().context("column 'seq' is not int64")?;
	let contents = str_col(batch, "content")?;
	let categories = str_col(batch, "category")?;
	let topics = str_col(batch, "topic")?;
	let severities = str_col(batch, "severity")?;
	let sources = str_col(batch, "source")?;
	let extras = str_col(batch, "extra_json")?;
	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let extra: BTreeMap<String, String> = if extras.is_null(i) { BTreeMap::new() } else { serde_json::from_str(extras.value(i))? };
		let metadata = DocMetadata {
			category: categories.value(i).parse()?,
			topic: topics.value(i).to_string(),
			severity: severities.value(i).parse()?,
			source: sources.value(i).to_string(),
			extra,
		};
		let doc = KnowledgeDocument { id: DocId::from(ids.value(i).to_string()), content: contents.value(i).to_string(), metadata };
		out.push((seqs.value(i), doc));
	}
	Ok(out)
}

/// Rows of a vector-search batch as `(seq, document, score)`; score = 1 - cosine distance in [0, 1].
fn decode_hits(batch: &RecordBatch) -> anyhow::Result<Vec<(i64, KnowledgeDocument, f32)>> {
	let distances = batch.column_by_name("_distance").context("column '_distance' missing")?.as_primitive_opt::<Float32Type>().context("column '_distance' is not float32")?;
	let docs = decode_documents(batch)?;
	Ok(docs.into_iter().enumerate().map(|(i, (seq, doc))| (seq, doc, distance_to_score(distances.value(i)))).collect())
}

pub fn distance_to_score(distance: f32) -> f32 {
	if distance.is_nan() { return 0.0; }
	(1.0 - distance).clamp(0.0, 1.0)
}
