
use std::sync::Arc;

use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, warn};

use crate::database::{RetrievalCandidate, VectorIndex};
use crate::llm::LlmClient;
use crate::request::DiagnosisRequest;
use crate::{DiagError, Result};

/// Number of candidates fetched by the initial vector search
const INITIAL_RETRIEVAL_LIMIT: usize = 10;

/// Number of candidates kept for the grounding context
const SELECTED_CANDIDATE_COUNT: usize = 3;

/// Candidate preview length shown to the re-ranking backend, in characters.
/// The backend ranks on these previews only, so ranking quality is bounded
/// by how representative the first 100 characters are.
const RERANK_PREVIEW_CHARS: usize = 100;

/// System instruction fixing persona, grounding discipline, answer structure
/// and output language (always Turkish, regardless of input language).
const DIAGNOSIS_SYSTEM_PROMPT: &str = "Sen uzman bir otomotiv arıza teşhis asistanısın. \
     Verilen bağlamı (context) kullanarak sorunu teşhis et. \
     Eğer bağlamda cevap yoksa, genel bilgini kullan ancak bunun kılavuzdan olmadığını açıkça belirt. \
     Cevabını 'Olası Sebepler' ve 'Çözüm Adımları' başlıklarıyla net bir şekilde formatla. \
     ÖNEMLİ: Her zaman Türkçe yanıt ver.";

/// Final answer for one diagnosis request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosisResult {
    /// Generated diagnosis text, returned verbatim from the backend
    pub diagnosis: String,
    /// Distinct sources of the selected chunks, first-seen order
    pub related_sources: Vec<String>,
}

/// Retrieval and re-ranking pipeline. Holds no per-request state; the shared
/// backend clients may serve concurrent requests.
pub struct DiagnosisPipeline {
    llm: Arc<dyn LlmClient>,
    index: Arc<dyn VectorIndex>,
}

impl DiagnosisPipeline {
    #[inline]
    pub fn new(llm: Arc<dyn LlmClient>, index: Arc<dyn VectorIndex>) -> Self {
        Self { llm, index }
    }

    /// Run the full pipeline for a validated request: expand the query, embed
    /// it, retrieve and re-rank candidates, then generate a grounded
    /// diagnosis.
    ///
    /// Expansion and re-ranking failures degrade to their fallbacks; a failed
    /// embedding, search or generation call aborts the request.
    #[inline]
    pub async fn diagnose(&self, request: &DiagnosisRequest) -> Result<DiagnosisResult> {
        let search_text = self.expand_query(request);
        debug!("Search text: {}", search_text);

        let embedding = self
            .llm
            .embed(&search_text)
            .map_err(|e| DiagError::Backend(format!("Embedding failed: {}", e)))?;

        let candidates = self
            .index
            .search(&embedding, INITIAL_RETRIEVAL_LIMIT)
            .await
            .map_err(|e| DiagError::Backend(format!("Vector search failed: {}", e)))?;
        debug!("Initial retrieval returned {} candidates", candidates.len());

        let selected = self.select_candidates(request, &candidates);

        let context = build_context(&selected);
        let user_prompt = format!(
            "Araç: {}\nBelirti: {}\n\nBağlam:\n{}",
            request.vehicle_info, request.symptom, context
        );

        let diagnosis = self
            .llm
            .complete(&user_prompt, Some(DIAGNOSIS_SYSTEM_PROMPT))
            .map_err(|e| DiagError::Backend(format!("Diagnosis generation failed: {}", e)))?;

        let related_sources = selected
            .iter()
            .map(|candidate| candidate.source_name.clone())
            .unique()
            .collect();

        Ok(DiagnosisResult {
            diagnosis,
            related_sources,
        })
    }

    /// Ask the backend for 3-5 related technical terms and fold them into the
    /// search text. Expansion terms are additive context only; on failure or
    /// blank output the vehicle+symptom pair is searched alone.
    fn expand_query(&self, request: &DiagnosisRequest) -> String {
        let base = format!("{} {}", request.vehicle_info, request.symptom);

        let prompt = format!(
            "Sen uzman bir otomotiv teknisyenisin. Bu belirti için arama sorgusunda \
             kullanılabilecek 3-5 teknik eş anlamlı kelime, ilgili parça adı veya olası \
             arıza modu öner. SADECE anahtar kelimeleri virgülle ayırarak döndür, başka \
             hiçbir metin ekleme.\n\nAraç: {}\nBelirti: {}",
            request.vehicle_info, request.symptom
        );

        match self.llm.complete(&prompt, None) {
            Ok(terms) if !terms.trim().is_empty() => format!("{} {}", base, terms.trim()),
            Ok(_) => base,
            Err(e) => {
                warn!("Query expansion failed, searching without it: {}", e);
                base
            }
        }
    }

    /// Re-rank the retrieved candidates and keep the most relevant three.
    /// Whenever the backend's answer yields no usable index, fall back to the
    /// first three retrieval results in similarity order; re-ranking failure
    /// never aborts the request.
    fn select_candidates(
        &self,
        request: &DiagnosisRequest,
        candidates: &[RetrievalCandidate],
    ) -> Vec<RetrievalCandidate> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let prompt = rerank_prompt(request, candidates);
        let indices = match self.llm.complete(&prompt, None) {
            Ok(reply) => parse_ranked_indices(&reply, candidates.len()),
            Err(e) => {
                warn!("Re-ranking failed, falling back to similarity order: {}", e);
                Vec::new()
            }
        };

        if indices.is_empty() {
            candidates
                .iter()
                .take(SELECTED_CANDIDATE_COUNT)
                .cloned()
                .collect()
        } else {
            indices
                .into_iter()
                .map(|index| candidates[index].clone())
                .collect()
        }
    }
}

fn rerank_prompt(request: &DiagnosisRequest, candidates: &[RetrievalCandidate]) -> String {
    let previews = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let preview: String = candidate.content.chars().take(RERANK_PREVIEW_CHARS).collect();
            format!("[{}] {}...", index, preview)
        })
        .join("\n");

    format!(
        "Sen yardımcı bir asistansın. Verilen döküman parçalarını sorguyla olan alaka \
         düzeyine göre sırala.\nSorgu: {} {}\n\nİşte döküman parçaları:\n{}\n\n\
         En alakalı 3 parçanın indeks numaralarını virgülle ayrılmış bir liste olarak \
         döndür (örneğin: 0,2,5). SADECE sayıları döndür.",
        request.vehicle_info, request.symptom, previews
    )
}

/// Parse the re-ranking reply permissively: split on commas, trim, keep
/// tokens that parse to an in-range index, cap at the first three in the
/// order the backend emitted them. The backend's output is untrusted; bad
/// tokens are dropped silently.
fn parse_ranked_indices(reply: &str, candidate_count: usize) -> Vec<usize> {
    reply
        .split(',')
        .filter_map(|token| token.trim().parse::<usize>().ok())
        .filter(|&index| index < candidate_count)
        .take(SELECTED_CANDIDATE_COUNT)
        .collect()
}

/// Labeled source/content blocks joined by blank lines, selection order
/// preserved
fn build_context(selected: &[RetrievalCandidate]) -> String {
    selected
        .iter()
        .map(|candidate| {
            format!(
                "Kaynak: {}\nİçerik: {}",
                candidate.source_name, candidate.content
            )
        })
        .join("\n\n")
}
