mod test_caption_pipeline;
