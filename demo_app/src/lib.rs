pub mod wav_io;
