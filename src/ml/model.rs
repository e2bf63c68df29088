// ============================================================
// Layer 5: GPT Decoder Model
// ============================================================
// A pre-norm causal transformer decoder.
//
//   ids [b, t]
//     │  token embedding + learned position embedding
//     ▼
//   DecoderBlock × num_layers
//     │    x = x + attn(norm(x), causal mask)
//     │    x = x + ffn(norm(x))
//     ▼
//   final LayerNorm → lm_head
//     ▼
//   scores [b, t, vocab]
//
// The training context and the generation driver only use the
// CausalLm trait, so any burn Module that maps ids to per-position
// scores can be trained or sampled from.

use burn::{
    nn::{
        attention::{generate_autoregressive_mask, MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::gelu,
};

// ─── Model Contract ───────────────────────────────────────────────────────────
/// A burn module that scores the next token at every position.
pub trait CausalLm<B: Backend>: Module<B> {
    /// ids: [batch, seq_len] → scores: [batch, seq_len, vocab_size]
    fn forward(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3>;

    /// Longest sequence the position embedding covers.
    fn max_seq_len(&self) -> usize;

    fn vocab_size(&self) -> usize;
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally, do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct GptConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl GptConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GptModel<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let blocks: Vec<DecoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let lm_head    = LinearConfig::new(self.d_model, self.vocab_size)
            .with_bias(false)
            .init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        GptModel {
            token_embedding, position_embedding, blocks,
            final_norm, lm_head, dropout,
            max_seq_len: self.max_seq_len,
            vocab_size:  self.vocab_size,
        }
    }

    fn build_block<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        let self_attn = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_in    = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_out   = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm_attn = LayerNormConfig::new(self.d_model).init(device);
        let norm_ffn  = LayerNormConfig::new(self.d_model).init(device);
        let dropout   = DropoutConfig::new(self.dropout).init();
        DecoderBlock { self_attn, ffn_in, ffn_out, norm_attn, norm_ffn, dropout }
    }
}

#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub self_attn: MultiHeadAttention<B>,
    pub ffn_in:    Linear<B>,
    pub ffn_out:   Linear<B>,
    pub norm_attn: LayerNorm<B>,
    pub norm_ffn:  LayerNorm<B>,
    pub dropout:   Dropout,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask: Tensor<B, 3, Bool>) -> Tensor<B, 3> {
        let h = self.norm_attn.forward(x.clone());
        let attn = self.self_attn
            .forward(MhaInput::self_attn(h).mask_attn(mask))
            .context;
        let x = x + self.dropout.forward(attn);

        let h = self.norm_ffn.forward(x.clone());
        let h = self.ffn_out.forward(gelu(self.ffn_in.forward(h)));
        x + self.dropout.forward(h)
    }
}

#[derive(Module, Debug)]
pub struct GptModel<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub blocks:             Vec<DecoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub lm_head:            Linear<B>,
    pub dropout:            Dropout,
    pub max_seq_len:        usize,
    pub vocab_size:         usize,
}

impl<B: Backend> CausalLm<B> for GptModel<B> {
    fn forward(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = ids.dims();
        let device = ids.device();

        let tok_emb = self.token_embedding.forward(ids);

        // [1, seq_len, d_model], broadcast over the batch
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .reshape([1, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mask = generate_autoregressive_mask::<B>(batch_size, seq_len, &device);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        for block in &self.blocks {
            x = block.forward(x, mask.clone());
        }
        self.lm_head.forward(self.final_norm.forward(x))
    }

    fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny() -> GptConfig {
        GptConfig::new(32, 8, 16, 2, 2, 32).with_dropout(0.0)
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model: GptModel<TestBackend> = tiny().init(&device);
        let ids = Tensor::<TestBackend, 1, Int>::from_ints([1, 2, 3, 4, 5, 6], &device)
            .reshape([2, 3]);
        assert_eq!(model.forward(ids).dims(), [2, 3, 32]);
        assert_eq!(model.max_seq_len(), 8);
        assert_eq!(model.vocab_size(), 32);
    }

    #[test]
    fn test_future_tokens_do_not_change_earlier_scores() {
        let device = Default::default();
        let model: GptModel<TestBackend> = tiny().init(&device);

        let short = Tensor::<TestBackend, 1, Int>::from_ints([3, 7], &device).reshape([1, 2]);
        let long  = Tensor::<TestBackend, 1, Int>::from_ints([3, 7, 11, 2], &device).reshape([1, 4]);

        let a = model.forward(short).slice([0..1, 0..2, 0..32]);
        let b = model.forward(long).slice([0..1, 0..2, 0..32]);

        let a = a.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        let b = b.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4, "{x} vs {y}");
        }
    }
}
