//! Face localisation and mask-wearing classification for video streams and
//! still images.

pub mod shared {
    pub mod bounding_box;
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
    pub mod video_metadata;
}

pub mod detection {
    pub mod domain {
        pub mod face_detection;
        pub mod face_locator;
    }
    pub mod infrastructure;
}

pub mod classification {
    pub mod domain {
        pub mod mask_classifier;
        pub mod mask_prediction;
    }
    pub mod infrastructure;
}

pub mod rendering {
    pub mod domain {
        pub mod frame_annotator;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod domain {
        pub mod image_writer;
        pub mod video_reader;
        pub mod video_writer;
    }
    pub mod infrastructure {
        pub mod ffmpeg_reader;
        pub mod ffmpeg_writer;
        pub mod image_file_reader;
        pub mod image_file_writer;
    }
}

pub mod pipeline {
    pub mod annotate_image_use_case;
    pub mod annotate_stream_use_case;
    pub mod face_crop;
    pub mod mask_pipeline;
    pub mod pipeline_error;
    pub mod pipeline_logger;

    pub mod infrastructure {
        pub mod threaded_frame_source;
    }
}
