// ============================================================
// Layer 2: Application / Use Cases
// ============================================================
// One use case per command. Each one wires the other layers
// together for a single goal and does no work of its own.
//
// Rules for this layer:
//   - No tensor code here (that's Layer 5)
//   - No printing here (that's Layer 1)
//   - No file formats here (that's Layers 4 and 6)
//
// Reference: Clean Architecture pattern

// Corpus → tokenizer → packed, shuffled dataset file
pub mod build_dataset_use_case;

// Dataset → trained weights, plot, metrics
pub mod train_use_case;

// Weights + prompt → generated text
pub mod generate_use_case;
