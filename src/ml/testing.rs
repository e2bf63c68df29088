// Test-only fixtures shared by the ml unit tests.

use burn::{
    backend::{
        candle::{Candle, CandleDevice},
        Autodiff, NdArray,
    },
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
};

use crate::data::dataset::PackedDataset;
use crate::ml::model::CausalLm;

pub type TestBackend  = NdArray;
pub type TestAutodiff = Autodiff<NdArray>;

/// CPU backend with f16 floats, standing in for the reduced-precision GPU backend.
pub type HalfBackend  = Candle<half::f16, i64>;
pub type HalfAutodiff = Autodiff<HalfBackend>;

/// Next-token scores read straight from a [vocab, vocab] table.
///
/// `gain` multiplies the scores; setting it to infinity makes the
/// loss and every gradient non-finite.
#[derive(Module, Debug)]
pub struct BigramLm<B: Backend> {
    pub table:       Embedding<B>,
    pub gain:        f64,
    pub max_seq_len: usize,
}

impl<B: Backend> CausalLm<B> for BigramLm<B> {
    fn forward(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.table.forward(ids).mul_scalar(self.gain)
    }

    fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    fn vocab_size(&self) -> usize {
        self.table.weight.val().dims()[0]
    }
}

pub fn bigram_on<B: Backend>(vocab: usize, device: &B::Device) -> BigramLm<B> {
    BigramLm {
        table:       EmbeddingConfig::new(vocab, vocab).init(device),
        gain:        1.0,
        max_seq_len: 64,
    }
}

pub fn bigram(vocab: usize) -> BigramLm<TestAutodiff> {
    bigram_on(vocab, &Default::default())
}

pub fn half_device() -> CandleDevice {
    CandleDevice::Cpu
}

pub fn half_bigram(vocab: usize, gain: f64) -> BigramLm<HalfAutodiff> {
    let mut model = bigram_on(vocab, &half_device());
    model.gain = gain;
    model
}

/// `rows` rows of width `window + 1` cycling through `0..vocab`.
pub fn counting_dataset(rows: usize, window: usize, vocab: usize) -> PackedDataset {
    let width = window + 1;
    let ids = (0..rows * width).map(|i| (i % vocab) as u32).collect();
    PackedDataset::new(window, vocab, ids).unwrap()
}

/// Flattened float values of every parameter, for before/after comparisons.
pub fn weights<B: Backend>(model: &BigramLm<B>) -> Vec<f32> {
    model.table.weight.val().into_data().convert::<f32>().to_vec::<f32>().unwrap()
}
