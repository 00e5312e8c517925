use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use log::{info, warn};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use medical_rag_chatbot::database::{
    PineconeClient, PineconeConfig, QdrantClient, QdrantConfig, VectorIndex,
};
use medical_rag_chatbot::huggingface::{HuggingFaceClient, HuggingFaceConfig};
use medical_rag_chatbot::inference::{InferenceClient, DEFAULT_MODELS};
use medical_rag_chatbot::rag::{RagEngine, VectorStoreRetriever};
use medical_rag_chatbot::web::{self, AppState};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VectorStore {
    Pinecone,
    Qdrant,
}

/// A medical question-answering chatbot backed by a vector index and HuggingFace models
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Vector index holding the document embeddings
    #[arg(long, env = "VECTOR_STORE", value_enum, default_value_t = VectorStore::Pinecone)]
    vector_store: VectorStore,

    /// Chat models to try, in order of preference
    #[arg(long, env = "HF_MODELS", value_delimiter = ',')]
    models: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    // Load configuration from environment
    let hf_config = HuggingFaceConfig::from_env()?;
    let huggingface = Arc::new(
        HuggingFaceClient::new(hf_config).context("Failed to initialize HuggingFace client")?,
    );
    info!("Embedding model: {}", huggingface.config().embedding_model);

    let index = connect_index(args.vector_store).await?;
    let retriever = VectorStoreRetriever::new(huggingface.clone(), index);

    let models = if args.models.is_empty() {
        DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
    } else {
        args.models
    };
    let inference = InferenceClient::with_models(huggingface, models);
    info!("Model preference: {}", inference.models().join(", "));

    let state = AppState {
        engine: Arc::new(RagEngine::new(Arc::new(retriever), inference)),
    };

    web::serve(state, SocketAddr::new(args.host, args.port)).await
}

async fn connect_index(store: VectorStore) -> Result<Arc<dyn VectorIndex>> {
    match store {
        VectorStore::Pinecone => {
            let config = PineconeConfig::from_env()?;
            let client = PineconeClient::new(config)
                .await
                .context("Failed to initialize Pinecone client")?;
            Ok(Arc::new(client))
        }
        VectorStore::Qdrant => {
            let config = QdrantConfig::from_env()?;
            let collection = config.collection.clone();
            let client = QdrantClient::new(config)
                .await
                .context("Failed to initialize Qdrant client")?;
            if !client.collection_exists().await? {
                warn!("Collection {} does not exist yet", collection);
            }
            Ok(Arc::new(client))
        }
    }
}
